//! Multipart binary upload to the file uploader service.

use std::path::Path;
use std::time::Duration;

use reqwest::blocking::multipart::Form;
use tracing::{debug, warn};

use mamwrap_contracts::error::{MamError, MamResult};
use mamwrap_core::traits::Uploader;

use crate::http::{join, read_body, PlatformClient};
use crate::response::{unwrap_response, value_to_id};

/// Multipart field the uploader expects the binary in.
pub const UPLOAD_FIELD: &str = "LUuploadFile";

/// Binaries can be large; uploads get their own, longer timeout.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// A shell command that repeats a failed upload by hand.
pub fn fallback_command(file: &Path, url: &str) -> String {
    format!("curl --form {}=@{} {}", UPLOAD_FIELD, file.display(), url)
}

impl Uploader for PlatformClient {
    fn upload(&self, transaction_id: &str, file: &Path) -> MamResult<String> {
        let mut url = join(&self.transport().endpoints().uploader_url, &["upload"])?;
        url.query_pairs_mut().append_pair("transactionID", transaction_id);

        let fail = |raw: String| {
            warn!(file = %file.display(), "upload failed");
            MamError::Upload { raw, fallback_command: fallback_command(file, url.as_str()) }
        };

        let form = Form::new()
            .file(UPLOAD_FIELD, file)
            .map_err(|e| fail(format!("cannot read {}: {}", file.display(), e)))?;

        debug!(url = %url, file = %file.display(), "uploading binary");
        let response = self
            .transport()
            .http()
            .post(url.clone())
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .map_err(|e| fail(e.to_string()))?;

        let (status, body) = read_body(response).map_err(|e| fail(e.to_string()))?;
        let file_id = unwrap_response(status, &body, &["fileID"]).map_err(|_| fail(body.clone()))?;
        value_to_id(&file_id).ok_or_else(|| fail(body.clone()))
    }
}
