use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::{ClientError, ServiceClient};
use crate::permissions::{Right, RightScope, RightsAuthority};

#[derive(Debug, Deserialize)]
struct ResultDto {
    result: bool,
}

/// Asks the reference-data service whether a user holds a right.
pub struct HttpRightsAuthority {
    client: ServiceClient,
}

impl HttpRightsAuthority {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RightsAuthority for HttpRightsAuthority {
    async fn has_right(&self, user_id: Uuid, right: Right, scope: RightScope) -> Result<bool, ClientError> {
        let mut query = vec![("rightName", right.name().to_string())];
        if let Some(program_id) = scope.program_id {
            query.push(("programId", program_id.to_string()));
        }
        if let Some(facility_id) = scope.facility_id {
            query.push(("facilityId", facility_id.to_string()));
        }

        let path = format!("/api/users/{}/hasRight", user_id);
        let response: ResultDto = self.client.get_json(&path, &query).await?;

        tracing::debug!(user_id = %user_id, right = %right, result = response.result, "Right lookup");
        Ok(response.result)
    }
}
