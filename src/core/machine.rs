//! Machine business logic - CRUD, agent registration, heartbeat and detail.
//!
//! Agents identify themselves by MAC address first and IP second:
//!
//! 1. A known MAC refreshes that machine. If another machine still holds the
//!    reported IP, that machine's IP is cleared so the unique index holds.
//! 2. An unknown MAC with a known IP adopts the MAC when the machine has none.
//!    If the machine already has a different MAC nothing is changed and the
//!    caller is told an explicit MAC update is required.
//! 3. Otherwise a new machine is created.
//!
//! Online/offline state is kept in `client_status`; a periodic sweep marks
//! machines offline once their heartbeat is older than a threshold.

use super::{optional_text, required_text};
use crate::{
    entities::{
        Buyer, Line, Machine, MachineType, ModelGroup, ModelProcess, ProductModel, Station,
        machine,
        machine::{OFFLINE, ONLINE},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, ConnectionTrait, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

const MAX_NAME_LEN: usize = 100;

/// Payload for creating or replacing a machine
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineInput {
    /// Display name
    pub name: String,
    /// Asset code
    pub machine_code: Option<String>,
    /// Operator status
    pub status: Option<String>,
    /// Machine type
    pub machine_type_id: Option<i32>,
    /// IPv4 address
    pub ip: Option<String>,
    /// MES name
    pub gmes_name: Option<String>,
    /// Station the machine is installed at
    pub station_id: Option<i32>,
    /// Loaded program
    pub program_name: Option<String>,
    /// MAC address in any common notation
    pub mac_address: Option<String>,
}

/// Registration request sent by an agent on start-up
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Agent's IPv4 address
    pub ip: String,
    /// Agent's MAC address
    pub mac_address: String,
    /// Preferred machine name
    #[serde(default)]
    pub machine_name: Option<String>,
    /// Agent version
    #[serde(default)]
    pub app_version: Option<String>,
}

/// Explicit MAC replacement for the machine currently holding an IP
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMacRequest {
    /// IP of the machine to update
    pub ip: String,
    /// New MAC address
    pub new_mac_address: String,
    /// New machine name
    #[serde(default)]
    pub machine_name: Option<String>,
    /// Agent version
    #[serde(default)]
    pub app_version: Option<String>,
}

/// Heartbeat sent periodically by an agent
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    /// Machine sending the heartbeat
    pub machine_id: i32,
}

/// Outcome of a registration attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResult {
    /// Whether the agent is now registered
    pub is_success: bool,
    /// Human-readable outcome
    pub message: String,
    /// The registered machine
    pub machine_info: Option<MachineDetail>,
    /// A new machine row was created
    pub is_new_machine: bool,
    /// The IP belongs to a machine with another MAC
    pub requires_mac_update: bool,
    /// The machine holding the IP when a MAC update is required
    pub existing_machine: Option<MachineDetail>,
}

/// Machine with the names of everything it is attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDetail {
    /// Machine ID
    pub id: i32,
    /// Display name
    pub name: String,
    /// Asset code
    pub machine_code: Option<String>,
    /// Operator status
    pub status: Option<String>,
    /// Machine type ID
    pub machine_type_id: Option<i32>,
    /// IPv4 address
    pub ip: Option<String>,
    /// MES name
    pub gmes_name: Option<String>,
    /// Station ID
    pub station_id: Option<i32>,
    /// Loaded program
    pub program_name: Option<String>,
    /// MAC address
    pub mac_address: Option<String>,
    /// Agent version
    pub app_version: Option<String>,
    /// "Online" or "Offline"
    pub client_status: String,
    /// Last registration or heartbeat
    pub last_seen: Option<DateTime<Utc>>,
    /// Newest uploaded log row
    pub last_log_time: Option<DateTime<Utc>>,
    /// Buyer of the model produced at the station
    pub buyer_name: Option<String>,
    /// Line of the station
    pub line_name: Option<String>,
    /// Station name
    pub station_name: Option<String>,
    /// Model produced at the station
    pub model_name: Option<String>,
    /// Machine type name
    pub machine_type_name: Option<String>,
}

/// Online/offline counts over all machines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineStats {
    /// All machines
    pub total: u64,
    /// Machines with `client_status = Online`
    pub online: u64,
    /// Everything else
    pub offline: u64,
}

/// Normalises a MAC address to upper-case, colon-separated form.
///
/// Accepts `:`, `-` or `.` separators, or none at all.
///
/// # Errors
/// Returns a validation error unless the input has exactly 12 hex digits.
pub fn normalize_mac(raw: &str) -> Result<String> {
    let hex: String = raw
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
        .collect::<String>()
        .to_ascii_uppercase();

    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::validation(format!("Invalid MAC address '{raw}'")));
    }

    let pairs: Vec<&str> = (0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect();
    Ok(pairs.join(":"))
}

/// Retrieves all machines ordered by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_machines(db: &DatabaseConnection) -> Result<Vec<machine::Model>> {
    Machine::find()
        .order_by_asc(machine::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific machine by its ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_machine_by_id<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<Option<machine::Model>> {
    Machine::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Finds the machine currently holding an IP address.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_machine_by_ip<C: ConnectionTrait>(
    db: &C,
    ip: &str,
) -> Result<Option<machine::Model>> {
    Machine::find()
        .filter(machine::Column::Ip.eq(ip.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds the machine with a MAC address, in any notation.
///
/// # Errors
/// Returns an error if the MAC is malformed or the query fails.
pub async fn get_machine_by_mac<C: ConnectionTrait>(
    db: &C,
    mac: &str,
) -> Result<Option<machine::Model>> {
    let mac = normalize_mac(mac)?;
    Machine::find()
        .filter(machine::Column::MacAddress.eq(mac))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn ensure_unique(
    db: &DatabaseConnection,
    column: machine::Column,
    field: &'static str,
    value: Option<&String>,
    exclude_id: Option<i32>,
) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    let mut query = Machine::find().filter(column.eq(value.as_str()));
    if let Some(id) = exclude_id {
        query = query.filter(machine::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::Duplicate {
            entity: "Machine",
            field,
            value: value.clone(),
        });
    }
    Ok(())
}

async fn validate(
    db: &DatabaseConnection,
    input: MachineInput,
    exclude_id: Option<i32>,
) -> Result<MachineInput> {
    let name = required_text("Name", &input.name, MAX_NAME_LEN)?;
    let mac_address = optional_text(input.mac_address)
        .map(|m| normalize_mac(&m))
        .transpose()?;
    let input = MachineInput {
        name,
        machine_code: optional_text(input.machine_code),
        status: optional_text(input.status),
        ip: optional_text(input.ip),
        gmes_name: optional_text(input.gmes_name),
        program_name: optional_text(input.program_name),
        mac_address,
        ..input
    };

    if let Some(station_id) = input.station_id {
        if Station::find_by_id(station_id).one(db).await?.is_none() {
            return Err(Error::InvalidReference {
                entity: "Station",
                id: station_id.into(),
            });
        }
    }
    if let Some(type_id) = input.machine_type_id {
        if MachineType::find_by_id(type_id).one(db).await?.is_none() {
            return Err(Error::InvalidReference {
                entity: "Machine type",
                id: type_id.into(),
            });
        }
    }

    ensure_unique(
        db,
        machine::Column::MachineCode,
        "code",
        input.machine_code.as_ref(),
        exclude_id,
    )
    .await?;
    ensure_unique(db, machine::Column::Ip, "IP", input.ip.as_ref(), exclude_id).await?;
    ensure_unique(
        db,
        machine::Column::MacAddress,
        "MAC address",
        input.mac_address.as_ref(),
        exclude_id,
    )
    .await?;

    Ok(input)
}

/// Creates a machine from operator input. New machines start `Offline`.
///
/// # Errors
/// Returns an error if the name is invalid, a reference does not exist, the
/// code, IP or MAC is already used, or the insert fails.
pub async fn create_machine(db: &DatabaseConnection, input: MachineInput) -> Result<machine::Model> {
    let input = validate(db, input, None).await?;
    let now = Utc::now();

    let created = machine::ActiveModel {
        name: Set(input.name),
        machine_code: Set(input.machine_code),
        status: Set(input.status),
        machine_type_id: Set(input.machine_type_id),
        ip: Set(input.ip),
        gmes_name: Set(input.gmes_name),
        station_id: Set(input.station_id),
        program_name: Set(input.program_name),
        mac_address: Set(input.mac_address),
        last_log_time: Set(None),
        app_version: Set(None),
        client_status: Set(OFFLINE.to_string()),
        last_seen: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(machine_id = created.id, name = %created.name, "Machine created");
    Ok(created)
}

/// Replaces the operator-editable fields of a machine.
///
/// # Errors
/// Returns an error if the machine does not exist, validation fails, or the
/// update fails.
pub async fn update_machine(
    db: &DatabaseConnection,
    id: i32,
    input: MachineInput,
) -> Result<machine::Model> {
    let existing = get_machine_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Machine", id))?;
    let input = validate(db, input, Some(id)).await?;

    let mut active: machine::ActiveModel = existing.into();
    active.name = Set(input.name);
    active.machine_code = Set(input.machine_code);
    active.status = Set(input.status);
    active.machine_type_id = Set(input.machine_type_id);
    active.ip = Set(input.ip);
    active.gmes_name = Set(input.gmes_name);
    active.station_id = Set(input.station_id);
    active.program_name = Set(input.program_name);
    active.mac_address = Set(input.mac_address);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Deletes a machine together with its commands, logs, log files and
/// configuration entries.
///
/// # Errors
/// Returns an error if the machine does not exist or the delete fails.
pub async fn delete_machine(db: &DatabaseConnection, id: i32) -> Result<()> {
    let result = Machine::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Machine", id));
    }
    info!(machine_id = id, "Machine deleted");
    Ok(())
}

/// Resolves the names attached to a machine through its station and type.
///
/// Missing links produce `None` names rather than errors.
///
/// # Errors
/// Returns an error if a database query fails.
pub async fn get_machine_detail<C: ConnectionTrait>(
    db: &C,
    machine: machine::Model,
) -> Result<MachineDetail> {
    let machine_type_name = match machine.machine_type_id {
        Some(id) => MachineType::find_by_id(id).one(db).await?.map(|t| t.name),
        None => None,
    };

    let station = match machine.station_id {
        Some(id) => Station::find_by_id(id).one(db).await?,
        None => None,
    };

    let mut line_name = None;
    let mut model_name = None;
    let mut buyer_name = None;
    if let Some(station) = &station {
        line_name = Line::find_by_id(station.line_id)
            .one(db)
            .await?
            .map(|l| l.name);

        let model = match ModelProcess::find_by_id(station.model_process_id)
            .one(db)
            .await?
        {
            Some(process) => ProductModel::find_by_id(process.model_id).one(db).await?,
            None => None,
        };
        if let Some(model) = model {
            let group = ModelGroup::find_by_id(model.model_group_id).one(db).await?;
            if let Some(group) = group {
                buyer_name = Buyer::find_by_id(group.buyer_id)
                    .one(db)
                    .await?
                    .map(|b| b.name);
            }
            model_name = Some(model.name);
        }
    }

    Ok(MachineDetail {
        id: machine.id,
        name: machine.name,
        machine_code: machine.machine_code,
        status: machine.status,
        machine_type_id: machine.machine_type_id,
        ip: machine.ip,
        gmes_name: machine.gmes_name,
        station_id: machine.station_id,
        program_name: machine.program_name,
        mac_address: machine.mac_address,
        app_version: machine.app_version,
        client_status: machine.client_status,
        last_seen: machine.last_seen,
        last_log_time: machine.last_log_time,
        buyer_name,
        line_name,
        station_name: station.map(|s| s.name),
        model_name,
        machine_type_name,
    })
}

/// Loads a machine by ID and resolves its detail.
///
/// # Errors
/// Returns an error if the machine does not exist or a query fails.
pub async fn get_machine_detail_by_id(db: &DatabaseConnection, id: i32) -> Result<MachineDetail> {
    let machine = get_machine_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Machine", id))?;
    get_machine_detail(db, machine).await
}

/// Clears the IP of any machine other than `keep_id` that holds `ip`.
async fn release_ip<C: ConnectionTrait>(db: &C, ip: &str, keep_id: i32) -> Result<()> {
    let holders = Machine::find()
        .filter(machine::Column::Ip.eq(ip))
        .filter(machine::Column::Id.ne(keep_id))
        .all(db)
        .await?;

    for holder in holders {
        warn!(
            machine_id = holder.id,
            ip,
            new_holder = keep_id,
            "IP conflict, clearing IP of previous holder"
        );
        let mut active: machine::ActiveModel = holder.into();
        active.ip = Set(None);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
    }
    Ok(())
}

/// Marks an existing machine online with the agent's current identity.
async fn refresh_identity<C: ConnectionTrait>(
    db: &C,
    existing: machine::Model,
    ip: &str,
    mac: &str,
    machine_name: Option<String>,
    app_version: Option<String>,
) -> Result<machine::Model> {
    release_ip(db, ip, existing.id).await?;

    let now = Utc::now();
    let mut active: machine::ActiveModel = existing.into();
    active.ip = Set(Some(ip.to_string()));
    active.mac_address = Set(Some(mac.to_string()));
    if let Some(name) = machine_name {
        active.name = Set(name);
    }
    if app_version.is_some() {
        active.app_version = Set(app_version);
    }
    active.client_status = Set(ONLINE.to_string());
    active.last_seen = Set(Some(now));
    active.updated_at = Set(now);
    active.update(db).await.map_err(Into::into)
}

/// Registers an agent by MAC address and IP.
///
/// # Errors
/// Returns an error if the IP or MAC is blank or malformed, or a database
/// operation fails.
pub async fn register_machine(
    db: &DatabaseConnection,
    request: RegisterRequest,
) -> Result<RegistrationResult> {
    let ip = request.ip.trim().to_string();
    if ip.is_empty() {
        return Err(Error::validation("IP address is required"));
    }
    if request.mac_address.trim().is_empty() {
        return Err(Error::validation("MAC address is required"));
    }
    let mac = normalize_mac(&request.mac_address)?;
    let machine_name = optional_text(request.machine_name);
    let app_version = optional_text(request.app_version);

    let txn = db.begin().await?;

    if let Some(existing) = get_machine_by_mac(&txn, &mac).await? {
        let ip_changed = existing.ip.as_deref() != Some(ip.as_str());
        let machine = refresh_identity(&txn, existing, &ip, &mac, machine_name, app_version).await?;
        txn.commit().await?;

        info!(machine_id = machine.id, %ip, %mac, ip_changed, "Machine re-registered by MAC");
        let detail = get_machine_detail(db, machine).await?;
        return Ok(RegistrationResult {
            is_success: true,
            message: if ip_changed {
                format!("Machine registered, IP updated to {ip}")
            } else {
                "Machine registered".to_string()
            },
            machine_info: Some(detail),
            is_new_machine: false,
            requires_mac_update: false,
            existing_machine: None,
        });
    }

    if let Some(existing) = get_machine_by_ip(&txn, &ip).await? {
        match existing.mac_address.as_deref() {
            None | Some("") => {
                let machine =
                    refresh_identity(&txn, existing, &ip, &mac, machine_name, app_version).await?;
                txn.commit().await?;

                info!(machine_id = machine.id, %ip, %mac, "MAC address assigned by IP match");
                let detail = get_machine_detail(db, machine).await?;
                return Ok(RegistrationResult {
                    is_success: true,
                    message: "Machine registered, MAC address assigned".to_string(),
                    machine_info: Some(detail),
                    is_new_machine: false,
                    requires_mac_update: false,
                    existing_machine: None,
                });
            }
            Some(other_mac) => {
                warn!(
                    machine_id = existing.id,
                    %ip,
                    registered_mac = other_mac,
                    reported_mac = %mac,
                    "IP is registered with a different MAC address"
                );
                let message = format!(
                    "IP {ip} is registered to machine '{}' with MAC {other_mac}",
                    existing.name
                );
                txn.rollback().await?;
                let detail = get_machine_detail(db, existing).await?;
                return Ok(RegistrationResult {
                    is_success: false,
                    message,
                    machine_info: None,
                    is_new_machine: false,
                    requires_mac_update: true,
                    existing_machine: Some(detail),
                });
            }
        }
    }

    let now = Utc::now();
    let created = machine::ActiveModel {
        name: Set(machine_name.unwrap_or_else(|| format!("Machine-{ip}"))),
        machine_code: Set(None),
        status: Set(None),
        machine_type_id: Set(None),
        ip: Set(Some(ip.clone())),
        gmes_name: Set(None),
        station_id: Set(None),
        program_name: Set(None),
        mac_address: Set(Some(mac.clone())),
        last_log_time: Set(None),
        app_version: Set(app_version),
        client_status: Set(ONLINE.to_string()),
        last_seen: Set(Some(now)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(machine_id = created.id, %ip, %mac, "New machine registered");
    let detail = get_machine_detail(db, created).await?;
    Ok(RegistrationResult {
        is_success: true,
        message: "New machine registered".to_string(),
        machine_info: Some(detail),
        is_new_machine: true,
        requires_mac_update: false,
        existing_machine: None,
    })
}

/// Replaces the MAC address of the machine holding `request.ip`.
///
/// # Errors
/// Returns an error if:
/// - The IP or MAC is blank or malformed
/// - No machine holds the IP
/// - Another machine already owns the MAC
/// - The update fails
pub async fn update_machine_mac(
    db: &DatabaseConnection,
    request: UpdateMacRequest,
) -> Result<MachineDetail> {
    let ip = request.ip.trim().to_string();
    if ip.is_empty() {
        return Err(Error::validation("IP address is required"));
    }
    let mac = normalize_mac(&request.new_mac_address)?;

    let existing = get_machine_by_ip(db, &ip)
        .await?
        .ok_or_else(|| Error::not_found("Machine", format!("IP {ip}")))?;

    if let Some(owner) = get_machine_by_mac(db, &mac).await? {
        if owner.id != existing.id {
            return Err(Error::validation(format!(
                "MAC address {mac} is already used by machine '{}'",
                owner.name
            )));
        }
    }

    let previous = existing.mac_address.clone();
    let machine = refresh_identity(
        db,
        existing,
        &ip,
        &mac,
        optional_text(request.machine_name),
        optional_text(request.app_version),
    )
    .await?;

    info!(machine_id = machine.id, ?previous, %mac, "MAC address updated");
    get_machine_detail(db, machine).await
}

/// Records a heartbeat: stamps `last_seen` and marks the machine online.
///
/// # Errors
/// Returns an error if the machine does not exist or the update fails.
pub async fn heartbeat(db: &DatabaseConnection, machine_id: i32) -> Result<machine::Model> {
    let existing = get_machine_by_id(db, machine_id)
        .await?
        .ok_or_else(|| Error::not_found("Machine", machine_id))?;

    let now = Utc::now();
    let mut active: machine::ActiveModel = existing.into();
    active.client_status = Set(ONLINE.to_string());
    active.last_seen = Set(Some(now));
    active.update(db).await.map_err(Into::into)
}

/// Marks `Online` machines whose last heartbeat is older than `threshold`
/// as `Offline`. Returns the number of machines changed.
///
/// # Errors
/// Returns an error if the update fails.
pub async fn mark_stale_offline(db: &DatabaseConnection, threshold: Duration) -> Result<u64> {
    let cutoff = chrono::Duration::from_std(threshold)
        .ok()
        .and_then(|t| Utc::now().checked_sub_signed(t))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let result = Machine::update_many()
        .col_expr(machine::Column::ClientStatus, Expr::value(OFFLINE))
        .filter(machine::Column::ClientStatus.eq(ONLINE))
        .filter(
            Condition::any()
                .add(machine::Column::LastSeen.is_null())
                .add(machine::Column::LastSeen.lt(cutoff)),
        )
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        info!(count = result.rows_affected, "Marked stale machines offline");
    }
    Ok(result.rows_affected)
}

/// Counts machines by connectivity status.
///
/// # Errors
/// Returns an error if a count query fails.
pub async fn get_machine_stats(db: &DatabaseConnection) -> Result<MachineStats> {
    let total = Machine::find().count(db).await?;
    let online = Machine::find()
        .filter(machine::Column::ClientStatus.eq(ONLINE))
        .count(db)
        .await?;
    Ok(MachineStats {
        total,
        online,
        offline: total.saturating_sub(online),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn register(ip: &str, mac: &str) -> RegisterRequest {
        RegisterRequest {
            ip: ip.to_string(),
            mac_address: mac.to_string(),
            machine_name: None,
            app_version: Some("1.0.0".to_string()),
        }
    }

    #[test]
    fn test_normalize_mac() {
        assert_eq!(normalize_mac("aa-bb-cc-dd-ee-ff").unwrap(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(normalize_mac("aabb.ccdd.eeff").unwrap(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(normalize_mac("AA:BB:CC:DD:EE:FF").unwrap(), "AA:BB:CC:DD:EE:FF");
        assert!(normalize_mac("AA:BB:CC").is_err());
        assert!(normalize_mac("GG:BB:CC:DD:EE:FF").is_err());
    }

    #[tokio::test]
    async fn test_register_validation() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(matches!(
            register_machine(&db, register(" ", "AA:BB:CC:DD:EE:FF")).await.unwrap_err(),
            Error::Validation { .. }
        ));
        assert!(matches!(
            register_machine(&db, register("10.224.1.10", "")).await.unwrap_err(),
            Error::Validation { .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_register_new_machine() -> Result<()> {
        let db = setup_test_db().await?;
        let result = register_machine(&db, register("10.224.1.10", "aa-bb-cc-dd-ee-ff")).await?;

        assert!(result.is_success);
        assert!(result.is_new_machine);
        let info = result.machine_info.unwrap();
        assert_eq!(info.name, "Machine-10.224.1.10");
        assert_eq!(info.mac_address.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(info.client_status, ONLINE);
        assert_eq!(info.app_version.as_deref(), Some("1.0.0"));
        Ok(())
    }

    #[tokio::test]
    async fn test_register_known_mac_moves_ip() -> Result<()> {
        let db = setup_test_db().await?;
        let first = register_machine(&db, register("10.224.1.10", "AA:BB:CC:DD:EE:01")).await?;
        let second = register_machine(&db, register("10.224.1.11", "AA:BB:CC:DD:EE:02")).await?;

        // Machine 1 comes back with machine 2's address
        let again = register_machine(&db, register("10.224.1.11", "AA:BB:CC:DD:EE:01")).await?;
        assert!(!again.is_new_machine);
        let info = again.machine_info.unwrap();
        assert_eq!(info.id, first.machine_info.unwrap().id);
        assert_eq!(info.ip.as_deref(), Some("10.224.1.11"));

        let displaced = get_machine_by_id(&db, second.machine_info.unwrap().id)
            .await?
            .unwrap();
        assert_eq!(displaced.ip, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_register_adopts_mac_for_ip_without_mac() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_test_machine(&db, "ICT-01", "10.224.1.20").await?;

        let result = register_machine(&db, register("10.224.1.20", "AA:BB:CC:DD:EE:20")).await?;
        assert!(result.is_success);
        assert!(!result.is_new_machine);
        let info = result.machine_info.unwrap();
        assert_eq!(info.id, created.id);
        assert_eq!(info.name, "ICT-01");
        assert_eq!(info.mac_address.as_deref(), Some("AA:BB:CC:DD:EE:20"));
        Ok(())
    }

    #[tokio::test]
    async fn test_register_ip_with_other_mac_requires_update() -> Result<()> {
        let db = setup_test_db().await?;
        register_machine(&db, register("10.224.1.30", "AA:BB:CC:DD:EE:30")).await?;

        let result = register_machine(&db, register("10.224.1.30", "AA:BB:CC:DD:EE:31")).await?;
        assert!(!result.is_success);
        assert!(result.requires_mac_update);
        let existing = result.existing_machine.unwrap();
        assert_eq!(existing.mac_address.as_deref(), Some("AA:BB:CC:DD:EE:30"));
        assert_eq!(get_all_machines(&db).await?.len(), 1);

        let detail = update_machine_mac(
            &db,
            UpdateMacRequest {
                ip: "10.224.1.30".to_string(),
                new_mac_address: "aa:bb:cc:dd:ee:31".to_string(),
                machine_name: None,
                app_version: None,
            },
        )
        .await?;
        assert_eq!(detail.mac_address.as_deref(), Some("AA:BB:CC:DD:EE:31"));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_mac_errors() -> Result<()> {
        let db = setup_test_db().await?;
        register_machine(&db, register("10.224.1.40", "AA:BB:CC:DD:EE:40")).await?;
        register_machine(&db, register("10.224.1.41", "AA:BB:CC:DD:EE:41")).await?;

        let missing = update_machine_mac(
            &db,
            UpdateMacRequest {
                ip: "10.224.9.9".to_string(),
                new_mac_address: "AA:BB:CC:DD:EE:99".to_string(),
                machine_name: None,
                app_version: None,
            },
        )
        .await;
        assert!(matches!(missing.unwrap_err(), Error::NotFound { .. }));

        let taken = update_machine_mac(
            &db,
            UpdateMacRequest {
                ip: "10.224.1.40".to_string(),
                new_mac_address: "AA:BB:CC:DD:EE:41".to_string(),
                machine_name: None,
                app_version: None,
            },
        )
        .await;
        assert!(matches!(taken.unwrap_err(), Error::Validation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_heartbeat_and_offline_sweep() -> Result<()> {
        let db = setup_test_db().await?;
        let machine = create_test_machine(&db, "ICT-01", "10.224.1.50").await?;
        assert_eq!(machine.client_status, OFFLINE);

        let beat = heartbeat(&db, machine.id).await?;
        assert_eq!(beat.client_status, ONLINE);
        assert!(beat.last_seen.is_some());

        // A fresh heartbeat survives a generous threshold
        assert_eq!(mark_stale_offline(&db, Duration::from_secs(3600)).await?, 0);
        // ...but not a zero one
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(mark_stale_offline(&db, Duration::ZERO).await?, 1);

        let stats = get_machine_stats(&db).await?;
        assert_eq!(stats, MachineStats { total: 1, online: 0, offline: 1 });

        assert!(matches!(
            heartbeat(&db, 999).await.unwrap_err(),
            Error::NotFound { .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_machine_detail_resolves_names() -> Result<()> {
        let fixture = setup_with_station().await?;
        let ict = crate::core::machine_type::create_machine_type(&fixture.db, "ICT".to_string())
            .await?;
        let machine = create_machine(
            &fixture.db,
            MachineInput {
                name: "ICT-01".to_string(),
                machine_type_id: Some(ict.id),
                station_id: Some(fixture.station.id),
                ip: Some("10.224.1.60".to_string()),
                ..Default::default()
            },
        )
        .await?;

        let detail = get_machine_detail_by_id(&fixture.db, machine.id).await?;
        assert_eq!(detail.buyer_name.as_deref(), Some("Test Buyer"));
        assert_eq!(detail.line_name.as_deref(), Some("L01"));
        assert_eq!(detail.station_name.as_deref(), Some("ST-01"));
        assert_eq!(detail.model_name.as_deref(), Some("SM-A156"));
        assert_eq!(detail.machine_type_name.as_deref(), Some("ICT"));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_machine_uniqueness_and_references() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_machine(&db, "ICT-01", "10.224.1.70").await?;

        let dup_ip = create_test_machine(&db, "ICT-02", "10.224.1.70").await;
        assert!(matches!(dup_ip.unwrap_err(), Error::Duplicate { field: "IP", .. }));

        let bad_station = create_machine(
            &db,
            MachineInput {
                name: "ICT-03".to_string(),
                station_id: Some(12),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(bad_station.unwrap_err(), Error::InvalidReference { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_machine() -> Result<()> {
        let db = setup_test_db().await?;
        let machine = create_test_machine(&db, "ICT-01", "10.224.1.80").await?;
        delete_machine(&db, machine.id).await?;
        assert!(matches!(
            delete_machine(&db, machine.id).await.unwrap_err(),
            Error::NotFound { .. }
        ));
        Ok(())
    }
}
