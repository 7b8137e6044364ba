use super::CliError;
use seispred_core::domain::{PredictError, RequestRecord};
use seispred_core::lookup::IndexKey;
use serde::Serialize;
use std::path::Path;

pub(super) fn read_request_batch(path: &Path) -> Result<Vec<RequestRecord>, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        CliError::Engine(PredictError::io_system(
            "IO.BATCH_READ",
            format!("failed to read request batch '{}': {}", path.display(), source),
        ))
    })?;
    let requests: Vec<RequestRecord> = serde_json::from_str(&text).map_err(|source| {
        CliError::Engine(PredictError::input_validation(
            "INPUT.BATCH_PARSE",
            format!("failed to parse request batch '{}': {}", path.display(), source),
        ))
    })?;
    if requests.is_empty() {
        return Err(CliError::Engine(PredictError::input_validation(
            "INPUT.BATCH_EMPTY",
            format!("request batch '{}' contains no requests", path.display()),
        )));
    }
    Ok(requests)
}

pub(super) fn read_json_file<T: serde::de::DeserializeOwned>(
    path: &Path,
    read_code: &'static str,
    parse_code: &'static str,
) -> Result<T, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        CliError::Engine(PredictError::io_system(
            read_code,
            format!("failed to read '{}': {}", path.display(), source),
        ))
    })?;
    serde_json::from_str(&text).map_err(|source| {
        CliError::Engine(PredictError::input_validation(
            parse_code,
            format!("failed to parse '{}': {}", path.display(), source),
        ))
    })
}

pub(super) fn write_json_report<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| {
            CliError::Engine(PredictError::io_system(
                "IO.REPORT_DIRECTORY",
                format!(
                    "failed to create report directory '{}': {}",
                    parent.display(),
                    source
                ),
            ))
        })?;
    }
    let rendered = serde_json::to_string_pretty(value).map_err(|source| {
        CliError::Engine(PredictError::internal(
            "CLI.REPORT_RENDER",
            format!("failed to render report: {source}"),
        ))
    })?;
    std::fs::write(path, rendered).map_err(|source| {
        CliError::Engine(PredictError::io_system(
            "IO.REPORT_WRITE",
            format!("failed to write report '{}': {}", path.display(), source),
        ))
    })
}

pub(super) fn render_claim_tuple(tuple: &[IndexKey]) -> String {
    let parts: Vec<String> = tuple
        .iter()
        .map(|key| match key {
            IndexKey::Receiver(id) => format!("receiver:{id}"),
            IndexKey::Phase(phase) => format!("phase:{phase}"),
            IndexKey::Attribute(attribute) => format!("attribute:{attribute}"),
            IndexKey::Name(name) => format!("name:{name}"),
        })
        .collect();
    parts.join(" / ")
}
