use super::data::open_report_source;
use super::provision::{ProvisionError, ProvisionedReport, ReportProvisioner};
use crate::config::AppConfig;
use crate::db;
use crate::sheets::GoogleSheets;
use actix_web::{web, HttpResponse, Responder};
use common::model::report::ReportInput;
use common::responses::ReportCreatedResponse;
use log::{error, info};
use std::collections::HashSet;

const REPORT_CREATED: &str = "Report created successfully";

pub(crate) async fn process(
    config: web::Data<AppConfig>,
    payload: web::Json<ReportInput>,
) -> impl Responder {
    let input = payload.into_inner();
    if let Err(message) = validate_input(&input) {
        return HttpResponse::BadRequest().json(ReportCreatedResponse { message, url: String::new() });
    }

    info!("Creating report '{}'", input.report_name);
    let result = tokio::task::spawn_blocking(move || create_report(&config, &input)).await;

    match result {
        Ok(Ok(report)) => {
            info!(
                "Report {} created with {} column(s) and {} role grant(s)",
                report.document_id,
                report.all_columns.len(),
                report.permissions.len()
            );
            HttpResponse::Ok().json(ReportCreatedResponse {
                message: REPORT_CREATED.to_string(),
                url: report.url,
            })
        }
        Ok(Err(e)) => HttpResponse::InternalServerError().json(ReportCreatedResponse {
            message: e.to_string(),
            url: String::new(),
        }),
        Err(e) => {
            error!("Report task failed: {}", e);
            HttpResponse::InternalServerError().json(ReportCreatedResponse {
                message: format!("Task join error: {}", e),
                url: String::new(),
            })
        }
    }
}

fn create_report(config: &AppConfig, input: &ReportInput) -> Result<ProvisionedReport, ProvisionError> {
    let mut conn = db::open(&config.database_path).map_err(ProvisionError::Store)?;
    let source = open_report_source(&config.database_path, &config.databases_dir)
        .map_err(ProvisionError::PrepareData)?;
    let provider = GoogleSheets::connect(&config.sheets).map_err(ProvisionError::CreateDocument)?;
    ReportProvisioner::new(&mut conn, &source, &provider, &config.provisioning).provision(input)
}

/// Rejects requests that cannot produce a usable sheet, before anything is created.
pub fn validate_input(input: &ReportInput) -> Result<(), String> {
    if input.report_name.trim().is_empty() {
        return Err("reportName must not be empty".to_string());
    }

    let mut names = HashSet::new();
    for column in &input.columns {
        if column.name.trim().is_empty() {
            return Err("column names must not be empty".to_string());
        }
        if !names.insert(column.name.as_str()) {
            return Err(format!("column '{}' is declared more than once", column.name));
        }
    }

    if let Some(stages) = input.staged() {
        let mut titles = HashSet::new();
        for stage in stages {
            if stage.name.trim().is_empty() {
                return Err("stage names must not be empty".to_string());
            }
            if !titles.insert(stage.name.as_str()) {
                return Err(format!("stage '{}' is declared more than once", stage.name));
            }
        }
    }

    Ok(())
}
