//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the factory hierarchy (buyers down to machines)
//! and the per-machine data the agents exchange with the server.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod buyer;
pub mod client_config;
pub mod command;
pub mod line;
pub mod log_data;
pub mod log_file;
pub mod machine;
pub mod machine_type;
pub mod model;
pub mod model_group;
pub mod model_process;
pub mod station;

// Re-export specific types to avoid conflicts
pub use buyer::{Column as BuyerColumn, Entity as Buyer, Model as BuyerModel};
pub use client_config::{
    Column as ClientConfigColumn, Entity as ClientConfig, Model as ClientConfigModel,
};
pub use command::{
    Column as CommandColumn, CommandStatus, Entity as Command, Model as CommandModel,
};
pub use line::{Column as LineColumn, Entity as Line, Model as LineModel};
pub use log_data::{Column as LogDataColumn, Entity as LogData, Model as LogDataModel};
pub use log_file::{Column as LogFileColumn, Entity as LogFile, Model as LogFileModel};
pub use machine::{Column as MachineColumn, Entity as Machine, Model as MachineModel};
pub use machine_type::{
    Column as MachineTypeColumn, Entity as MachineType, Model as MachineTypeModel,
};
pub use model::{Column as ProductModelColumn, Entity as ProductModel, Model as ProductModelRow};
pub use model_group::{
    Column as ModelGroupColumn, Entity as ModelGroup, Model as ModelGroupModel,
};
pub use model_process::{
    Column as ModelProcessColumn, Entity as ModelProcess, Model as ModelProcessModel,
};
pub use station::{Column as StationColumn, Entity as Station, Model as StationModel};
