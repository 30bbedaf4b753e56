pub mod config;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, FindOneAndUpdateOptions, FindOptions, ReturnDocument, ServerApi, ServerApiVersion};
use mongodb::{bson, Client, Collection};
use uuid::Uuid;

use crate::database::mongodb::config::MongoDbConfig;
use crate::database::{Database, DatabaseError};
use crate::jobs::types::{JobItem, JobItemUpdates, JobStatus};
use crate::utils::settings::Settings;

trait ToDocument {
    fn to_document(&self) -> Result<Document, DatabaseError>;
}

impl<T: serde::Serialize> ToDocument for T {
    fn to_document(&self) -> Result<Document, DatabaseError> {
        let bson = bson::to_bson(self)?;
        if let Bson::Document(doc) = bson {
            Ok(doc)
        } else {
            Err(DatabaseError::FailedToSerializeDocument(format!("expected a document, got {}", bson)))
        }
    }
}

pub struct MongoDb {
    client: Client,
    database_name: String,
}

impl MongoDb {
    pub async fn new_with_settings(settings: &impl Settings) -> Self {
        let mongo_db_settings = MongoDbConfig::new_with_settings(settings);
        let mut client_options =
            ClientOptions::parse(&mongo_db_settings.url).await.expect("Failed to parse MongoDB Url");
        // Set the server_api field of the client_options object to set the version of the Stable API on the client
        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);
        // Get a handle to the cluster
        let client = Client::with_options(client_options).expect("Failed to create MongoDB client");
        // Ping the server to see if you can connect to the cluster
        client
            .database("admin")
            .run_command(doc! {"ping": 1}, None)
            .await
            .expect("Failed to ping MongoDB deployment");
        tracing::debug!("Pinged your deployment. You successfully connected to MongoDB!");

        Self { client, database_name: mongo_db_settings.database_name }
    }

    /// Mongodb client uses Arc internally, reducing the cost of clone.
    /// Directly using clone is not recommended for libraries not using Arc internally.
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    fn get_job_collection(&self) -> Collection<JobItem> {
        self.client.database(&self.database_name).collection("jobs")
    }
}

#[async_trait]
impl Database for MongoDb {
    #[tracing::instrument(skip(self), fields(function_type = "db_call"), ret, err)]
    async fn create_job(&self, job: JobItem) -> Result<JobItem, DatabaseError> {
        self.get_job_collection().insert_one(&job, None).await?;
        tracing::debug!(job_id = %job.id, category = "db_call", "Job created in database");
        Ok(job)
    }

    #[tracing::instrument(skip(self), fields(function_type = "db_call"), ret, err)]
    async fn get_job_by_id(&self, id: Uuid) -> Result<Option<JobItem>, DatabaseError> {
        let filter = doc! {
            "id": id,
        };
        tracing::debug!(job_id = %id, category = "db_call", "Fetched job by ID");
        Ok(self.get_job_collection().find_one(filter, None).await?)
    }

    #[tracing::instrument(skip(self), fields(function_type = "db_call"), err)]
    async fn get_jobs_by_owner(&self, owner_token: &str, limit: i64) -> Result<Vec<JobItem>, DatabaseError> {
        let filter = doc! {
            "owner_token": owner_token,
        };
        let find_options = FindOptions::builder().sort(doc! { "created_at": -1 }).limit(limit).build();
        let jobs: Vec<JobItem> =
            self.get_job_collection().find(filter, find_options).await?.try_collect().await?;
        tracing::debug!(job_count = jobs.len(), category = "db_call", "Retrieved jobs for owner");
        Ok(jobs)
    }

    /// Version gated update. The filter includes the version the caller
    /// read, so a concurrent writer that already bumped the version makes
    /// this call return `UpdateFailed` instead of silently overwriting.
    #[tracing::instrument(skip(self), fields(function_type = "db_call"), ret, err)]
    async fn update_job(&self, current_job: &JobItem, updates: JobItemUpdates) -> Result<JobItem, DatabaseError> {
        let filter = doc! {
            "id": current_job.id,
            "version": current_job.version,
        };
        let options = FindOneAndUpdateOptions::builder().upsert(false).return_document(ReturnDocument::After).build();

        let updates = updates.to_document()?;

        // remove null values from the updates
        let mut non_null_updates = Document::new();
        updates.iter().for_each(|(k, v)| {
            if v != &Bson::Null {
                non_null_updates.insert(k, v.clone());
            }
        });

        // throw an error if there's no field to be updated
        if non_null_updates.is_empty() {
            return Err(DatabaseError::NoUpdateFound("No field to be updated, likely a false call".to_string()));
        }

        // Fields that are always updated
        non_null_updates.insert("version", Bson::Int32(current_job.version + 1));
        non_null_updates.insert("updated_at", Bson::DateTime(Utc::now().round_subsecs(0).into()));

        // A terminal record carries exactly one of result_ref/error_detail.
        let mut update = doc! { "$set": non_null_updates };
        match updates.get("status").and_then(|s| s.as_str()) {
            Some(s) if s == JobStatus::Completed.to_string() => {
                update.insert("$unset", doc! { "error_detail": "" });
            }
            Some(s) if s == JobStatus::Failed.to_string() => {
                update.insert("$unset", doc! { "result_ref": "" });
            }
            _ => {}
        }

        let result = self.get_job_collection().find_one_and_update(filter, update, options).await?;
        match result {
            Some(job) => {
                tracing::debug!(job_id = %current_job.id, category = "db_call", "Job updated successfully");
                Ok(job)
            }
            None => {
                tracing::warn!(job_id = %current_job.id, category = "db_call", "Failed to update job. Job version is likely outdated");
                Err(DatabaseError::UpdateFailed(format!("Failed to update job. Identifier - {}", current_job.id)))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(function_type = "db_call"), ret, err)]
    async fn delete_job(&self, id: Uuid) -> Result<(), DatabaseError> {
        let filter = doc! {
            "id": id,
        };
        self.get_job_collection().delete_one(filter, None).await?;
        tracing::debug!(job_id = %id, category = "db_call", "Job deleted from database");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(function_type = "db_call"), err)]
    async fn get_jobs_completed_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<JobItem>, DatabaseError> {
        let filter = doc! {
            "status": { "$in": [JobStatus::Completed.to_string(), JobStatus::Failed.to_string()] },
            "completed_at": { "$lt": Bson::DateTime(cutoff.into()) },
        };
        let find_options = FindOptions::builder().limit(limit).build();
        let jobs: Vec<JobItem> =
            self.get_job_collection().find(filter, find_options).await?.try_collect().await?;
        tracing::debug!(job_count = jobs.len(), category = "db_call", "Retrieved expired jobs");
        Ok(jobs)
    }

    #[tracing::instrument(skip(self), fields(function_type = "db_call"), err)]
    async fn get_jobs_stuck_in_processing(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobItem>, DatabaseError> {
        let filter = doc! {
            "status": JobStatus::Processing.to_string(),
            "updated_at": { "$lt": Bson::DateTime(cutoff.into()) },
        };
        let jobs: Vec<JobItem> = self.get_job_collection().find(filter, None).await?.try_collect().await?;
        tracing::debug!(job_count = jobs.len(), category = "db_call", "Retrieved jobs stuck in processing");
        Ok(jobs)
    }
}
