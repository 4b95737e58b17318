/*!
# Reference tags

Every rewritten reference needs an explicit decision whether it becomes a
pointer or a value of the implementation type. The decision is written on the
line directly above the reference:

```go
//noifgo:{Adder,p; Logger,v}
func run(a Adder, l Logger) {}
```

One line may carry several interface names because one source line often
holds several references.
*/

use crate::core::{DevirtError, SourceFile};

/// Marker token that opens a reference tag
pub const REFERENCE_MARKER: &str = "noifgo:";

/// How an interface-typed reference is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    /// `p`: `*Impl`
    Pointer,
    /// `v`: `Impl`
    Value,
}

impl Conversion {
    /// Sigil prepended to the rewritten type
    pub fn sigil(self) -> &'static str {
        match self {
            Conversion::Pointer => "*",
            Conversion::Value => "",
        }
    }
}

/// Ways a reference tag can be malformed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("{path}:{row}: reference on the first line has no tag above it")]
    NoLineAbove { path: String, row: usize },

    #[error("{path}:{row}: expected exactly one `noifgo:` tag, found {count}")]
    MissingMarker { path: String, row: usize, count: usize },

    #[error("{path}:{row}: `noifgo:` must be followed by `{{`")]
    MissingOpenBrace { path: String, row: usize },

    #[error("{path}:{row}: missing closing `}}`")]
    MissingCloseBrace { path: String, row: usize },

    #[error("{path}:{row}: `{pair}` is not a `Name,kind` pair")]
    MissingPairDelimiter { path: String, row: usize, pair: String },

    #[error("{path}:{row}: kind `{kind}` for {name} must be `p` or `v`")]
    UnknownKind {
        path: String,
        row: usize,
        name: String,
        kind: String,
    },

    #[error("{path}:{row}: tag has no entry for interface {name}")]
    NoMatchingPair { path: String, row: usize, name: String },
}

/// Reads the tag above the reference on `reference_row` and returns the
/// conversion for `interface_name`.
pub fn read_reference_tag(
    source: &SourceFile,
    reference_row: usize,
    interface_name: &str,
) -> Result<Conversion, DevirtError> {
    let path = source.path().display().to_string();
    if reference_row <= 1 {
        return Err(TagError::NoLineAbove {
            path,
            row: reference_row,
        }
        .into());
    }
    let tag_row = reference_row - 1;
    let line = source
        .line(tag_row)
        .map_err(|e| DevirtError::position(source.path(), e))?;
    let line = String::from_utf8_lossy(line);
    Ok(parse_reference_tag(&line, interface_name, &path, tag_row)?)
}

/// Parses `...noifgo:{Name,kind; Name,kind}...` and picks `interface_name`.
///
/// Whitespace is allowed around a pair but not around its comma.
///
/// `path` and `row` only label errors.
pub fn parse_reference_tag(
    line: &str,
    interface_name: &str,
    path: &str,
    row: usize,
) -> Result<Conversion, TagError> {
    let parts: Vec<&str> = line.split(REFERENCE_MARKER).collect();
    if parts.len() != 2 {
        return Err(TagError::MissingMarker {
            path: path.to_string(),
            row,
            count: parts.len().saturating_sub(1),
        });
    }

    let body = parts[1]
        .strip_prefix('{')
        .ok_or_else(|| TagError::MissingOpenBrace {
            path: path.to_string(),
            row,
        })?;
    let close = body.rfind('}').ok_or_else(|| TagError::MissingCloseBrace {
        path: path.to_string(),
        row,
    })?;

    for pair in body[..close].split(';') {
        let pair = pair.trim();
        let (name, kind) = match pair.split(',').collect::<Vec<_>>().as_slice() {
            [name, kind] => (*name, *kind),
            _ => {
                return Err(TagError::MissingPairDelimiter {
                    path: path.to_string(),
                    row,
                    pair: pair.to_string(),
                })
            }
        };
        if name != interface_name {
            continue;
        }
        return match kind {
            "p" => Ok(Conversion::Pointer),
            "v" => Ok(Conversion::Value),
            other => Err(TagError::UnknownKind {
                path: path.to_string(),
                row,
                name: name.to_string(),
                kind: other.to_string(),
            }),
        };
    }

    Err(TagError::NoMatchingPair {
        path: path.to_string(),
        row,
        name: interface_name.to_string(),
    })
}
