//! Publishing a new application binary.
//!
//!   create transaction → upload file → publish metadata

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use mamwrap_contracts::{error::MamResult, ids::Psk};

use crate::traits::{PublishService, Uploader};

pub struct Publisher {
    service: Arc<dyn PublishService>,
    uploader: Arc<dyn Uploader>,
}

impl Publisher {
    pub fn new(service: Arc<dyn PublishService>, uploader: Arc<dyn Uploader>) -> Self {
        Self { service, uploader }
    }

    /// Publish `file` as a new application described by `metadata` and
    /// return the platform's id for it.
    ///
    /// Stops at the first failing step. An upload failure comes back as
    /// `MamError::Upload` with a command that repeats the upload by hand.
    pub fn publish(&self, file: &Path, metadata: &Value) -> MamResult<Psk> {
        let transaction_id = self.service.create_transaction()?;
        info!(transaction_id = %transaction_id, file = %file.display(), "publish transaction created");

        let file_id = self.uploader.upload(&transaction_id, file)?;
        info!(transaction_id = %transaction_id, file_id = %file_id, "binary uploaded");

        let app_id = self.service.publish(&transaction_id, &file_id, metadata)?;
        info!(app_id = %app_id, "application published");
        Ok(app_id)
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use serde_json::{json, Value};

    use mamwrap_contracts::{
        error::{MamError, MamResult},
        ids::Psk,
    };

    use crate::traits::{PublishService, Uploader};

    use super::Publisher;

    #[derive(Default)]
    struct MockService {
        published: Arc<Mutex<Vec<(String, String, Value)>>>,
    }

    impl PublishService for MockService {
        fn create_transaction(&self) -> MamResult<String> {
            Ok("tx-1".to_string())
        }

        fn publish(&self, transaction_id: &str, file_id: &str, metadata: &Value) -> MamResult<Psk> {
            self.published.lock().unwrap().push((
                transaction_id.to_string(),
                file_id.to_string(),
                metadata.clone(),
            ));
            Ok(Psk::new("555"))
        }
    }

    struct MockUploader {
        fail: bool,
        uploads: Arc<Mutex<Vec<(String, PathBuf)>>>,
    }

    impl Uploader for MockUploader {
        fn upload(&self, transaction_id: &str, file: &Path) -> MamResult<String> {
            self.uploads
                .lock()
                .unwrap()
                .push((transaction_id.to_string(), file.to_path_buf()));
            if self.fail {
                return Err(MamError::Upload {
                    raw: "<html>502</html>".to_string(),
                    fallback_command: "curl --form LUuploadFile=@app.ipa https://up/upload?transactionID=tx-1"
                        .to_string(),
                });
            }
            Ok("file-9".to_string())
        }
    }

    #[test]
    fn test_publish_threads_ids_through_each_step() {
        let service = MockService::default();
        let published = service.published.clone();
        let uploads = Arc::new(Mutex::new(vec![]));
        let publisher = Publisher::new(
            Arc::new(service),
            Arc::new(MockUploader { fail: false, uploads: uploads.clone() }),
        );

        let metadata = json!({ "name": "Field Notes", "version": "1.2" });
        let app_id = publisher.publish(Path::new("app.ipa"), &metadata).unwrap();

        assert_eq!(app_id, Psk::new("555"));
        assert_eq!(
            *uploads.lock().unwrap(),
            vec![("tx-1".to_string(), PathBuf::from("app.ipa"))]
        );
        assert_eq!(
            *published.lock().unwrap(),
            vec![("tx-1".to_string(), "file-9".to_string(), metadata)]
        );
    }

    #[test]
    fn test_upload_failure_skips_publish() {
        let service = MockService::default();
        let published = service.published.clone();
        let publisher = Publisher::new(
            Arc::new(service),
            Arc::new(MockUploader { fail: true, uploads: Arc::new(Mutex::new(vec![])) }),
        );

        let result = publisher.publish(Path::new("app.ipa"), &json!({}));

        match result {
            Err(MamError::Upload { fallback_command, .. }) => {
                assert!(fallback_command.starts_with("curl --form LUuploadFile=@app.ipa"));
            }
            other => panic!("expected Upload error, got {:?}", other),
        }
        assert!(published.lock().unwrap().is_empty());
    }
}
