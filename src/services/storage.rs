use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::fs;
use tracing::debug;

use crate::{error::AppError, models::trip::TripState};

const CURRENT_TRIP_FILE: &str = "current_trip.json";

/// File-backed per-driver state under `<root>/drivers/<driver_id>/`.
#[derive(Clone)]
pub struct StorageService {
    root: Arc<PathBuf>,
}

impl StorageService {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_structure(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root().join("drivers")).await?;
        Ok(())
    }

    pub fn driver_dir(&self, driver_id: &str) -> PathBuf {
        // Ids come from the backend; keep them from escaping the data root.
        let safe: String = driver_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root().join("drivers").join(safe)
    }

    pub async fn ensure_driver_dir(&self, driver_id: &str) -> Result<PathBuf, AppError> {
        let dir = self.driver_dir(driver_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    pub async fn load_trip_state(&self, driver_id: &str) -> Result<TripState, AppError> {
        let path = self.driver_dir(driver_id).join(CURRENT_TRIP_FILE);
        if !fs::try_exists(&path).await? {
            return Ok(TripState::Idle);
        }
        let raw = fs::read(&path).await?;
        if raw.is_empty() {
            return Ok(TripState::Idle);
        }
        let state: TripState =
            serde_json::from_slice(&raw).map_err(|err| AppError::Other(err.into()))?;
        Ok(state)
    }

    pub async fn save_trip_state(&self, driver_id: &str, state: &TripState) -> Result<(), AppError> {
        if *state == TripState::Idle {
            return self.clear_trip_state(driver_id).await;
        }
        let dir = self.ensure_driver_dir(driver_id).await?;
        let data = serde_json::to_vec_pretty(state).map_err(|err| AppError::Other(err.into()))?;
        fs::write(dir.join(CURRENT_TRIP_FILE), data).await?;
        debug!(driver = %driver_id, state = state.name(), "trip state saved");
        Ok(())
    }

    pub async fn clear_trip_state(&self, driver_id: &str) -> Result<(), AppError> {
        let path = self.driver_dir(driver_id).join(CURRENT_TRIP_FILE);
        if fs::try_exists(&path).await? {
            fs::remove_file(path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_ids_cannot_traverse() {
        let storage = StorageService::new(PathBuf::from("/data"));
        assert_eq!(storage.driver_dir("../etc"), PathBuf::from("/data/drivers/___etc"));
        assert_eq!(storage.driver_dir("drv-42"), PathBuf::from("/data/drivers/drv-42"));
    }
}
