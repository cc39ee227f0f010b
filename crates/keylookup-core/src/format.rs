//! Response formatting: drain a sequence into one body
//!
//! Output is built only from a fully drained, successful sequence. Any
//! failure along the way discards what was accumulated and is returned as is.

use std::collections::BTreeMap;
use std::fmt;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::attribute::KeyMetadata;
use crate::sequence::{FallibleSequence, Step};
use crate::store::ByteStream;
use crate::{Error, Result};

/// Characters left as-is when encoding user ids, matching URI component rules
const USER_ID_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContentType {
    #[serde(rename = "application/pgp-keys")]
    PgpKeys,
    #[serde(rename = "text/plain")]
    Text,
    #[serde(rename = "application/json")]
    Json,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::PgpKeys => "application/pgp-keys",
            ContentType::Text => "text/plain",
            ContentType::Json => "application/json",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatted {
    pub body: Bytes,
    pub content_type: ContentType,
    /// Number of records the body was built from
    pub records: usize,
}

/// Index rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexFormat {
    #[default]
    MachineReadable,
    Json,
}

/// Concatenate every key stream into one armored body
///
/// Streams are read one after another. A failed read stops everything: the
/// source sequence is closed with the failure and no body is produced.
pub async fn format_keys<S>(keys: &mut S) -> Result<Formatted>
where
    S: FallibleSequence<ByteStream> + ?Sized,
{
    let mut body = BytesMut::new();
    let mut records = 0usize;

    loop {
        match keys.pull().await {
            Step::Item(mut stream) => {
                records += 1;
                while let Some(chunk) = stream.next().await {
                    match chunk {
                        Ok(chunk) => body.extend_from_slice(&chunk),
                        Err(cause) => return Err(abandon(keys, cause).await),
                    }
                }
            }
            Step::Done(outcome) => {
                outcome?;
                break;
            }
            Step::Exhausted => return Err(Error::Closed),
        }
    }

    Ok(Formatted {
        body: body.freeze(),
        content_type: ContentType::PgpKeys,
        records,
    })
}

async fn abandon<S>(sequence: &mut S, cause: Error) -> Error
where
    S: FallibleSequence<ByteStream> + ?Sized,
{
    match sequence.close(Err(cause)).await {
        Err(cause) => cause,
        Ok(()) => Error::Closed,
    }
}

/// Render key metadata as an index
pub async fn format_indices<S>(keys: &mut S, format: IndexFormat) -> Result<Formatted>
where
    S: FallibleSequence<KeyMetadata> + ?Sized,
{
    match format {
        IndexFormat::MachineReadable => machine_readable(keys).await,
        IndexFormat::Json => json_index(keys).await,
    }
}

async fn machine_readable<S>(keys: &mut S) -> Result<Formatted>
where
    S: FallibleSequence<KeyMetadata> + ?Sized,
{
    let mut body = String::new();
    let mut records = 0usize;

    loop {
        match keys.pull().await {
            Step::Item(meta) => {
                records += 1;
                body.push_str(&format!(
                    "pub:{}\nuid:{}\n",
                    meta.fingerprint,
                    utf8_percent_encode(&meta.primary_user_id, USER_ID_ENCODE_SET)
                ));
            }
            Step::Done(outcome) => {
                outcome?;
                break;
            }
            Step::Exhausted => return Err(Error::Closed),
        }
    }

    Ok(Formatted {
        body: Bytes::from(body),
        content_type: ContentType::Text,
        records,
    })
}

async fn json_index<S>(keys: &mut S) -> Result<Formatted>
where
    S: FallibleSequence<KeyMetadata> + ?Sized,
{
    let mut index = BTreeMap::new();
    let mut records = 0usize;

    loop {
        match keys.pull().await {
            Step::Item(meta) => {
                records += 1;
                index.insert(meta.fingerprint.clone(), meta);
            }
            Step::Done(outcome) => {
                outcome?;
                break;
            }
            Step::Exhausted => return Err(Error::Closed),
        }
    }

    Ok(Formatted {
        body: Bytes::from(serde_json::to_vec(&index)?),
        content_type: ContentType::Json,
        records,
    })
}
