use crate::utils::settings::Settings;

/// Represents the config of AWSS3 client.
#[derive(Clone, Debug)]
pub struct AWSS3Config {
    /// The name of the S3 bucket.
    pub bucket_name: String,
}

impl AWSS3Config {
    pub fn new_with_settings(settings: &impl Settings) -> Self {
        Self { bucket_name: settings.get_settings_or_panic("AWS_S3_BUCKET_NAME") }
    }
}
