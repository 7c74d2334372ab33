//! Image lookup by numeric item id
//!
//! `GET <route>?itemid=<digits>` resolves `<images_dir>/<itemid><ext>` for the
//! first existing extension in [`IMAGE_EXTENSIONS`] and streams it back.
//! Nothing touches the filesystem until the id is known to be all digits.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use futures_util::TryStreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::{Method, Response, StatusCode};
use percent_encoding::percent_decode_str;
use tokio::fs::{self, File};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::http::mime::{get_content_type, IMAGE_EXTENSIONS};
use crate::http::{self, ResponseBody};
use crate::logger;

const ITEM_ID_PARAM: &str = "itemid";

/// Read size per streamed chunk
const CHUNK_SIZE: usize = 64 * 1024;

pub const INVALID_ITEM_ID: &str = "invalid itemid. use digits only.";
pub const IMAGE_NOT_FOUND: &str = "image not found";
pub const INTERNAL_ERROR: &str = "internal server error";

/// Why an image request did not produce an image
#[derive(Debug)]
pub enum ImageError {
    /// `itemid` missing or not all ASCII digits
    InvalidItemId,
    /// No candidate file exists for the id
    NotFound,
    /// Filesystem failure before any byte was sent
    Io(io::Error),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidItemId => f.write_str(INVALID_ITEM_ID),
            Self::NotFound => f.write_str(IMAGE_NOT_FOUND),
            Self::Io(e) => write!(f, "image lookup failed: {e}"),
        }
    }
}

impl std::error::Error for ImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ImageError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl ImageError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidItemId => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing response; I/O details only go to the error log
    pub fn into_response(self) -> Response<ResponseBody> {
        let message = match &self {
            Self::InvalidItemId => INVALID_ITEM_ID,
            Self::NotFound => IMAGE_NOT_FOUND,
            Self::Io(_) => {
                logger::log_error(&self.to_string());
                INTERNAL_ERROR
            }
        };
        http::build_json_error(self.status(), message)
    }
}

/// A file that matched one of the probed extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub path: PathBuf,
    pub extension: &'static str,
}

impl ResolvedImage {
    pub fn content_type(&self) -> &'static str {
        get_content_type(self.extension)
    }
}

/// Serve one image request
///
/// Always returns a complete response; errors are mapped to their JSON
/// bodies here.
pub async fn serve_image(
    method: &Method,
    query: Option<&str>,
    images_dir: &Path,
) -> Response<ResponseBody> {
    if *method != Method::GET {
        return http::build_405_response();
    }

    match lookup(query, images_dir).await {
        Ok(resp) => resp,
        Err(e) => e.into_response(),
    }
}

async fn lookup(
    query: Option<&str>,
    images_dir: &Path,
) -> Result<Response<ResponseBody>, ImageError> {
    let raw = item_id_from_query(query);
    let item_id = validate_item_id(&raw)?;
    let image = resolve_image(images_dir, item_id).await?;
    let (file, len) = open_image(&image).await?;
    let content_type = image.content_type();

    Ok(http::build_image_response(
        stream_file(file, image.path),
        content_type,
        len,
    ))
}

/// Extract `itemid` from a raw query string
///
/// Missing parameter yields an empty string. Repeated parameters are joined
/// with `,`, which never validates.
pub fn item_id_from_query(query: Option<&str>) -> String {
    let Some(query) = query else {
        return String::new();
    };

    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key) == ITEM_ID_PARAM).then(|| decode_component(value))
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_component(s: &str) -> String {
    percent_decode_str(&s.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

/// Accept one or more ASCII digits and nothing else
pub fn validate_item_id(item_id: &str) -> Result<&str, ImageError> {
    if !item_id.is_empty() && item_id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(item_id)
    } else {
        Err(ImageError::InvalidItemId)
    }
}

/// Find the first `<item_id><ext>` regular file under `images_dir`
///
/// Candidates that are missing or not regular files are skipped; any other
/// stat failure aborts the probe.
pub async fn resolve_image(
    images_dir: &Path,
    item_id: &str,
) -> Result<ResolvedImage, ImageError> {
    for extension in IMAGE_EXTENSIONS {
        let path = images_dir.join(format!("{item_id}{extension}"));
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => return Ok(ResolvedImage { path, extension }),
            Ok(_) => {}
            Err(e) if is_absent(&e) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Err(ImageError::NotFound)
}

/// Stat failures that mean no file can exist at the candidate path
///
/// `InvalidFilename` covers ids too long for a file name; `NotADirectory`
/// covers an images dir that is a regular file.
fn is_absent(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory | io::ErrorKind::InvalidFilename
    )
}

/// Open the resolved file and read its length from the open handle
async fn open_image(image: &ResolvedImage) -> Result<(File, u64), ImageError> {
    let file = File::open(&image.path).await.map_err(|e| {
        // removed between probe and open
        if e.kind() == io::ErrorKind::NotFound {
            ImageError::NotFound
        } else {
            ImageError::Io(e)
        }
    })?;
    let len = file.metadata().await?.len();
    Ok((file, len))
}

/// Stream a reader in chunks
///
/// Read errors are logged and end the body with an error, which makes hyper
/// abort the connection instead of sending a second response. Dropping the
/// body (client gone) drops the reader and closes the file.
fn stream_file<R>(reader: R, path: PathBuf) -> ResponseBody
where
    R: AsyncRead + Send + Sync + 'static,
{
    let stream = ReaderStream::with_capacity(reader, CHUNK_SIZE)
        .map_ok(Frame::data)
        .map_err(move |e| {
            logger::log_error(&format!("stream error on {}: {e}", path.display()));
            e
        });
    StreamBody::new(stream).boxed()
}
