use anyhow::Result;
use retail_cli::config::PipelineConfig;
use retail_cli::pipeline::{RunOptions, run};
use retail_cli::types::{LoadTarget, RunResult};
use retail_model::WarehouseTable;

use crate::cli::RunArgs;

pub fn run_schema() {
    for table in WarehouseTable::ALL {
        println!("{}\n", table.schema().create_table_sql());
    }
}

pub fn run_pipeline(args: &RunArgs) -> Result<RunResult> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    apply_overrides(&mut config, args);

    let target = if args.no_load {
        LoadTarget::Skip
    } else if args.dry_run {
        LoadTarget::Memory
    } else {
        LoadTarget::Postgres
    };
    let options = RunOptions {
        data_dir: args.data_dir.clone(),
        output_dir: args
            .output_dir
            .clone()
            .unwrap_or_else(|| args.data_dir.join("output")),
        config,
        target,
    };
    run(&options)
}

fn apply_overrides(config: &mut PipelineConfig, args: &RunArgs) {
    if let Some(policy) = args.policy {
        config.load.policy = policy.into();
    }
    if args.require_columns {
        config.load.require_columns = true;
    }
    if let Some(ms) = args.batch_timeout_ms {
        config.load.batch_timeout_ms = Some(ms);
    }
    let warehouse = &mut config.warehouse;
    if let Some(host) = &args.warehouse_host {
        warehouse.host.clone_from(host);
    }
    if let Some(port) = args.warehouse_port {
        warehouse.port = port;
    }
    if let Some(service) = &args.warehouse_service {
        warehouse.service.clone_from(service);
    }
    if let Some(user) = &args.warehouse_user {
        warehouse.user.clone_from(user);
    }
    if let Some(password) = &args.warehouse_password {
        warehouse.password = Some(password.clone());
    }
}
