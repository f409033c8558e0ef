use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::domain::CCError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_size: u64,
    pub file_type: FileType,
}

/// A loaded column, every value rendered as a string. Missing values are empty.
pub type ColumnData = (String, Vec<String>);

pub fn detect_file_type(path: &Path) -> Result<FileType, CCError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(CCError::UnknownFileType),
    }
}

pub fn get_file_info(path: PathBuf) -> Result<FileInfo, CCError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CCError::FileNotFound,
        ErrorKind::PermissionDenied => CCError::PermissionDenied,
        _ => CCError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(CCError::LoadingFailed("Not a file!".into()));
    }

    let file_type = detect_file_type(&path)?;
    Ok(FileInfo {
        path,
        file_size: metadata.len(),
        file_type,
    })
}

/// Load a data file into string columns, one rayon task per column.
pub fn load_data_file(path: PathBuf) -> Result<Vec<ColumnData>, CCError> {
    let file_info = get_file_info(path)?;
    info!(
        "Loading {} ({} bytes)",
        file_info.path.display(),
        file_info.file_size
    );
    let frame = match file_info.file_type {
        FileType::CSV => load_csv(&file_info.path)?,
        FileType::PARQUET => load_parquet(&file_info.path)?,
        FileType::ARROW => load_arrow(&file_info.path)?,
    };

    let start_time = Instant::now();
    let df = Arc::new(frame.collect()?);
    let columns: Result<Vec<ColumnData>, PolarsError> = df
        .get_column_names()
        .par_iter()
        .map(|name| load_column(&df, name))
        .collect();
    let columns = columns?;

    info!(
        "Loading {} columns took {}ms ...",
        columns.len(),
        start_time.elapsed().as_millis()
    );
    Ok(columns)
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<ColumnData, PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let data = series
        .into_iter()
        .map(|value| match value {
            Some(s) => s.replace("\r\n", " ↵ ").replace('\n', " ↵ "),
            None => String::new(),
        })
        .collect();
    Ok((col_name.to_string(), data))
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}
