use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

/// Blue/green slot color. BLUE always owns `basePort`, GREEN `basePort + 1`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Color {
    Blue,
    Green,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::Blue => Color::Green,
            Color::Green => Color::Blue,
        }
    }

    pub fn lower(self) -> &'static str {
        match self {
            Color::Blue => "blue",
            Color::Green => "green",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::Blue => write!(f, "BLUE"),
            Color::Green => write!(f, "GREEN"),
        }
    }
}

impl std::str::FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BLUE" => Ok(Color::Blue),
            "GREEN" => Ok(Color::Green),
            _ => Err(format!("invalid color: {}", s)),
        }
    }
}

/// Deployment pipeline status. PENDING is reserved and never written in
/// normal flow; a deployment is created directly in DEPLOYING.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Pending,
    Deploying,
    Active,
    Failed,
    RolledBack,
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentStatus::Pending => write!(f, "PENDING"),
            DeploymentStatus::Deploying => write!(f, "DEPLOYING"),
            DeploymentStatus::Active => write!(f, "ACTIVE"),
            DeploymentStatus::Failed => write!(f, "FAILED"),
            DeploymentStatus::RolledBack => write!(f, "ROLLED_BACK"),
        }
    }
}

impl std::str::FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(DeploymentStatus::Pending),
            "DEPLOYING" => Ok(DeploymentStatus::Deploying),
            "ACTIVE" => Ok(DeploymentStatus::Active),
            "FAILED" => Ok(DeploymentStatus::Failed),
            "ROLLED_BACK" => Ok(DeploymentStatus::RolledBack),
            _ => Err(format!("invalid deployment status: {}", s)),
        }
    }
}

macro_rules! sqlite_text_enum {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Sqlite> for $ty {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <String as sqlx::Type<sqlx::Sqlite>>::type_info()
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $ty {
            fn encode_by_ref(
                &self,
                args: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
                args.push(sqlx::sqlite::SqliteArgumentValue::Text(
                    std::borrow::Cow::Owned(self.to_string()),
                ));
                Ok(sqlx::encode::IsNull::No)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $ty {
            fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: String = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                s.parse().map_err(|e: String| {
                    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
                        as Box<dyn std::error::Error + Send + Sync>
                })
            }
        }
    };
}

sqlite_text_enum!(Color);
sqlite_text_enum!(DeploymentStatus);

pub type EnvMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub repo_url: String,
    pub branch: String,
    pub build_context: String,
    pub local_path: String,
    pub app_port: i64,
    pub health_path: String,
    pub base_port: i64,
    pub webhook_secret: String,
    #[sqlx(json)]
    pub env: EnvMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn port_for(&self, color: Color) -> i64 {
        match color {
            Color::Blue => self.base_port,
            Color::Green => self.base_port + 1,
        }
    }

    pub fn container_name(&self, color: Color) -> String {
        format!("{}-{}", self.name, color.lower())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
    pub name: String,
    pub repo_url: String,
    pub branch: String,
    pub build_context: String,
    pub app_port: i64,
    pub health_path: String,
    pub env: EnvMap,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    pub project_id: String,
    pub version: i64,
    pub color: Color,
    pub port: i64,
    pub container_name: String,
    pub image_tag: String,
    pub status: DeploymentStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
