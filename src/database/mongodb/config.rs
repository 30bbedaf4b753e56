use crate::utils::settings::Settings;

#[derive(Clone, Debug)]
pub struct MongoDbConfig {
    /// Connection string of the MongoDB deployment.
    pub url: String,
    /// Name of the database holding the jobs collection.
    pub database_name: String,
}

impl MongoDbConfig {
    pub fn new_with_settings(settings: &impl Settings) -> Self {
        Self {
            url: settings.get_settings_or_panic("MONGODB_CONNECTION_STRING"),
            database_name: settings.get_settings_or_panic("MONGODB_DATABASE_NAME"),
        }
    }
}
