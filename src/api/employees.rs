//! Employee directory, cached without expiry under [`EMPLOYEE_LIST_KEY`]

use super::rest::{Query, RestClient};
use crate::cache::Expiry;
use crate::error::{RemoteFailure, TriplogError, TriplogResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const EMPLOYEES_TABLE: &str = "employees";

/// Cache domain key of the employee list
pub const EMPLOYEE_LIST_KEY: &str = "empl_list";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Employee {
    pub id: String,
    pub name: String,
}

#[derive(Clone)]
pub struct EmployeesApi {
    rest: RestClient,
}

impl EmployeesApi {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// Every employee, served from cache once fetched
    pub async fn list(&self) -> TriplogResult<Vec<Employee>> {
        const OP: &str = "get_employees";
        let rows = self
            .rest
            .select_cached(
                EMPLOYEES_TABLE,
                &Query::new().select("id,name"),
                EMPLOYEE_LIST_KEY,
                Expiry::Infinite,
            )
            .await
            .map_err(|e| e.during(OP).with_notice("Failed to load employees"))?;

        serde_json::from_value(Value::Array(rows)).map_err(|e| {
            TriplogError::Internal(RemoteFailure::new(
                OP,
                format!("malformed employee rows: {}", e),
            ))
        })
    }

    /// Drop the cached list; returns the new version
    pub fn invalidate(&self) -> u64 {
        self.rest.cache().bump(EMPLOYEE_LIST_KEY)
    }
}
