use async_trait::async_trait;
use hubspace::DeviceRecord;
use hubspace::HubspaceClient;
use hubspace::StateValue;

/// Where the coordinator gets devices from and pushes state to.
///
/// This trait allows for mocking the vendor cloud for testing purposes
#[async_trait]
pub trait DeviceSource: Send + Sync {
    async fn authenticate(&self) -> hubspace::Result<()>;

    /// Fetch a complete snapshot of every device on the account
    async fn fetch_all_devices(&self) -> hubspace::Result<Vec<DeviceRecord>>;

    async fn set_state(&self, metadevice_id: &str, values: &[StateValue]) -> hubspace::Result<()>;
}

#[async_trait]
impl DeviceSource for HubspaceClient {
    async fn authenticate(&self) -> hubspace::Result<()> {
        HubspaceClient::authenticate(self).await
    }

    async fn fetch_all_devices(&self) -> hubspace::Result<Vec<DeviceRecord>> {
        HubspaceClient::fetch_all_devices(self).await
    }

    async fn set_state(&self, metadevice_id: &str, values: &[StateValue]) -> hubspace::Result<()> {
        HubspaceClient::set_state(self, metadevice_id, values).await
    }
}

/// Mock device source for testing
///
/// Each fetch pops the next queued response; an empty queue yields an empty
/// account.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockDeviceSource {
    pub fetches: std::sync::Mutex<std::collections::VecDeque<hubspace::Result<Vec<DeviceRecord>>>>,
    pub pushed: std::sync::Mutex<Vec<(String, Vec<StateValue>)>>,
    pub reject_auth: bool,
    pub reject_set_state: bool,
}

#[cfg(test)]
impl MockDeviceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, response: hubspace::Result<Vec<DeviceRecord>>) {
        self.fetches.lock().unwrap().push_back(response);
    }

    pub fn pushed(&self) -> Vec<(String, Vec<StateValue>)> {
        self.pushed.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl DeviceSource for MockDeviceSource {
    async fn authenticate(&self) -> hubspace::Result<()> {
        if self.reject_auth {
            return Err(hubspace::Error::Auth("bad credentials".to_string()));
        }
        Ok(())
    }

    async fn fetch_all_devices(&self) -> hubspace::Result<Vec<DeviceRecord>> {
        self.fetches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn set_state(&self, metadevice_id: &str, values: &[StateValue]) -> hubspace::Result<()> {
        if self.reject_set_state {
            return Err(hubspace::Error::Http {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        self.pushed
            .lock()
            .unwrap()
            .push((metadevice_id.to_string(), values.to_vec()));
        Ok(())
    }
}
