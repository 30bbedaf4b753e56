use std::sync::Arc;

use aws_config::meta::region::RegionProviderChain;
use aws_config::{Region, SdkConfig};
use aws_credential_types::Credentials;
use dotenvy::dotenv;

use crate::data_storage::aws_s3::AWSS3;
use crate::data_storage::DataStorage;
use crate::database::mongodb::MongoDb;
use crate::database::Database;
use crate::queue::sqs::SqsQueue;
use crate::queue::QueueProvider;
use crate::utils::env_utils::get_env_var_or_panic;
use crate::utils::settings::{EnvSettingsProvider, Settings};

/// The app config. Holds the client objects the orchestrator talks to.
/// Built once by the process entry point and passed around explicitly;
/// there is no global client state.
pub struct Config {
    /// The database client
    database: Box<dyn Database>,
    /// Queue client
    queue: Box<dyn QueueProvider>,
    /// Storage client
    storage: Box<dyn DataStorage>,
}

/// `ProviderConfig` is an enum used to represent the cloud provider config
/// built using the settings provider. More providers can be added eg : GCP, AZURE etc.
///
/// We are using a Box<SdkConfig> because the config size is large and keeping it
/// behind a pointer is a better way to pass it through.
#[derive(Clone)]
pub enum ProviderConfig {
    AWS(Box<SdkConfig>),
}

impl ProviderConfig {
    pub fn get_aws_client_or_panic(&self) -> &SdkConfig {
        match self {
            ProviderConfig::AWS(config) => config.as_ref(),
        }
    }
}

/// To build a `SdkConfig` for AWS provider.
pub async fn get_aws_config(settings_provider: &impl Settings) -> SdkConfig {
    let region = settings_provider.get_settings_or_panic("AWS_REGION");
    let region_provider = RegionProviderChain::first_try(Region::new(region)).or_default_provider();
    let credentials = Credentials::from_keys(
        settings_provider.get_settings_or_panic("AWS_ACCESS_KEY_ID"),
        settings_provider.get_settings_or_panic("AWS_SECRET_ACCESS_KEY"),
        None,
    );
    aws_config::from_env().credentials_provider(credentials).region(region_provider).load().await
}

/// Initializes the app config
pub async fn init_config() -> Arc<Config> {
    dotenv().ok();

    let settings_provider = EnvSettingsProvider {};
    let provider_config = ProviderConfig::AWS(Box::new(get_aws_config(&settings_provider).await));

    let database = build_database_client(&settings_provider).await;
    let storage = build_storage_client(&settings_provider, &provider_config).await;
    let queue = build_queue_client(&provider_config);

    Arc::new(Config::new(database, queue, storage))
}

impl Config {
    /// Create a new config
    pub fn new(
        database: Box<dyn Database>,
        queue: Box<dyn QueueProvider>,
        storage: Box<dyn DataStorage>,
    ) -> Self {
        Self { database, queue, storage }
    }

    /// Returns the database client
    pub fn database(&self) -> &dyn Database {
        self.database.as_ref()
    }

    /// Returns the queue provider
    pub fn queue(&self) -> &dyn QueueProvider {
        self.queue.as_ref()
    }

    /// Returns the storage provider
    pub fn storage(&self) -> &dyn DataStorage {
        self.storage.as_ref()
    }
}

/// Builds the database client based on the environment variable DATABASE
pub async fn build_database_client(settings_provider: &impl Settings) -> Box<dyn Database + Send + Sync> {
    match get_env_var_or_panic("DATABASE").as_str() {
        "mongodb" => Box::new(MongoDb::new_with_settings(settings_provider).await),
        _ => panic!("Unsupported Database Client"),
    }
}

/// Builds the storage client based on the environment variable DATA_STORAGE
pub async fn build_storage_client(
    settings_provider: &impl Settings,
    provider_config: &ProviderConfig,
) -> Box<dyn DataStorage + Send + Sync> {
    match get_env_var_or_panic("DATA_STORAGE").as_str() {
        "s3" => Box::new(AWSS3::new_with_settings(settings_provider, provider_config).await),
        _ => panic!("Unsupported Storage Client"),
    }
}

/// Builds the queue client based on the environment variable QUEUE_PROVIDER
pub fn build_queue_client(provider_config: &ProviderConfig) -> Box<dyn QueueProvider + Send + Sync> {
    match get_env_var_or_panic("QUEUE_PROVIDER").as_str() {
        "sqs" => Box::new(SqsQueue::new(provider_config.clone())),
        _ => panic!("Unsupported Queue Client"),
    }
}
