// ==========================================
// 生产排程系统 - 排程行 CSV 解析
// ==========================================
// 列: product_id, scheduled_quantity, priority, demand_line_id, warehouse_id, location
// 必需列: product_id, scheduled_quantity；其余列可缺省
// 规则: 跳过全空行；行级问题全部收集后一次返回
// ==========================================

use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::domain::production_item::NewProductionItem;
use crate::importer::error::{ImportError, ImportResult, RowError};

const COL_PRODUCT_ID: &str = "product_id";
const COL_SCHEDULED_QUANTITY: &str = "scheduled_quantity";
const COL_PRIORITY: &str = "priority";
const COL_DEMAND_LINE_ID: &str = "demand_line_id";
const COL_WAREHOUSE_ID: &str = "warehouse_id";
const COL_LOCATION: &str = "location";

const REQUIRED_COLUMNS: [&str; 2] = [COL_PRODUCT_ID, COL_SCHEDULED_QUANTITY];

// ==========================================
// ScheduleLineCsvParser - 排程行解析器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ScheduleLineCsvParser;

impl ScheduleLineCsvParser {
    /// 解析 CSV 文件
    pub fn parse_file(&self, path: &Path) -> ImportResult<Vec<NewProductionItem>> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        if let Some(ext) = path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        let file = File::open(path)?;
        self.parse_reader(file)
    }

    /// 解析任意输入流
    pub fn parse_reader<R: Read>(&self, mut input: R) -> ImportResult<Vec<NewProductionItem>> {
        // 整体读入，便于按字节偏移换算行号
        let mut buf = Vec::new();
        input.read_to_end(&mut buf)?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .trim(csv::Trim::All)
            .from_reader(buf.as_slice());

        // 表头 → 列序号（大小写不敏感）
        let columns: HashMap<String, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(idx, h)| (h.trim().trim_start_matches('\u{feff}').to_lowercase(), idx))
            .collect();
        for required in REQUIRED_COLUMNS {
            if !columns.contains_key(required) {
                return Err(ImportError::MissingColumn(required.to_string()));
            }
        }

        let mut items = Vec::new();
        let mut errors = Vec::new();

        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(err) => match err.kind() {
                    csv::ErrorKind::Utf8 { .. } => {
                        let row = err.position().map(|p| line_of(&buf, p)).unwrap_or(0);
                        errors.push(row_error(row, "*", "不是有效的 UTF-8 文本"));
                        continue;
                    }
                    _ => return Err(err.into()),
                },
            };
            let row = record.position().map(|p| line_of(&buf, p)).unwrap_or(0);
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            let cell = |name: &str| -> Option<String> {
                columns
                    .get(name)
                    .and_then(|&idx| record.get(idx))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };

            let mut row_errors = Vec::new();

            let product_id = cell(COL_PRODUCT_ID).unwrap_or_default();
            if product_id.is_empty() {
                row_errors.push(row_error(row, COL_PRODUCT_ID, "不能为空"));
            }

            let scheduled_quantity = match cell(COL_SCHEDULED_QUANTITY) {
                None => {
                    row_errors.push(row_error(row, COL_SCHEDULED_QUANTITY, "不能为空"));
                    0.0
                }
                Some(raw) => match raw.parse::<f64>() {
                    Ok(q) if q > 0.0 && q.is_finite() => q,
                    Ok(q) => {
                        row_errors.push(row_error(
                            row,
                            COL_SCHEDULED_QUANTITY,
                            &format!("必须大于0 (实际 {})", q),
                        ));
                        0.0
                    }
                    Err(_) => {
                        row_errors.push(row_error(
                            row,
                            COL_SCHEDULED_QUANTITY,
                            &format!("不是有效数字: {}", raw),
                        ));
                        0.0
                    }
                },
            };

            let priority = match cell(COL_PRIORITY) {
                None => 0,
                Some(raw) => raw.parse::<i32>().unwrap_or_else(|_| {
                    row_errors.push(row_error(row, COL_PRIORITY, &format!("不是有效整数: {}", raw)));
                    0
                }),
            };

            if row_errors.is_empty() {
                items.push(NewProductionItem {
                    product_id,
                    scheduled_quantity,
                    priority,
                    demand_line_id: cell(COL_DEMAND_LINE_ID),
                    warehouse_id: cell(COL_WAREHOUSE_ID),
                    location: cell(COL_LOCATION),
                });
            } else {
                errors.extend(row_errors);
            }
        }

        if !errors.is_empty() {
            tracing::warn!(error_count = errors.len(), "排程行 CSV 存在数据问题");
            return Err(ImportError::RowErrors(errors));
        }
        if items.is_empty() {
            return Err(ImportError::EmptyFile);
        }

        tracing::debug!(rows = items.len(), "排程行 CSV 解析完成");
        Ok(items)
    }
}

/// 记录起始位置 → 文件行号（从1开始）
///
/// csv 读取器在跳过空行之前记下位置，这里先越过空行再计数
fn line_of(buf: &[u8], pos: &csv::Position) -> usize {
    let start = (pos.byte() as usize).min(buf.len());
    let blank = buf[start..]
        .iter()
        .take_while(|&&b| b == b'\r' || b == b'\n')
        .count();
    1 + buf[..start + blank].iter().filter(|&&b| b == b'\n').count()
}

fn row_error(row: usize, field: &str, message: &str) -> RowError {
    RowError {
        row,
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_valid_rows() {
        let data = "product_id,scheduled_quantity,priority,demand_line_id,warehouse_id,location\n\
                    FG1,100,2,SOL1,WH1,A-01\n\
                    FG2,25.5,,,,\n";

        let items = ScheduleLineCsvParser.parse_reader(data.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].product_id, "FG1");
        assert_eq!(items[0].priority, 2);
        assert_eq!(items[0].demand_line_id.as_deref(), Some("SOL1"));
        assert_eq!(items[0].location.as_deref(), Some("A-01"));
        assert_eq!(items[1].scheduled_quantity, 25.5);
        assert_eq!(items[1].warehouse_id, None);
    }

    #[test]
    fn test_collects_all_row_errors() {
        let data = "product_id,scheduled_quantity,priority\n\
                    ,10,1\n\
                    FG2,-3,x\n\
                    FG3,abc,0\n";

        match ScheduleLineCsvParser.parse_reader(data.as_bytes()) {
            Err(ImportError::RowErrors(errors)) => {
                assert_eq!(errors.len(), 4);
                assert_eq!(errors[0].row, 2);
                assert_eq!(errors[0].field, "product_id");
                assert_eq!(errors[1].row, 3);
                assert_eq!(errors[3].row, 4);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_row_numbers_count_blank_lines_and_bad_encoding() {
        let data: &[u8] = b"product_id,scheduled_quantity\n\
                            FG1,\xff\xfe\n\
                            \n\
                            FG2,abc\n\
                            FG3,4\n";

        match ScheduleLineCsvParser.parse_reader(data) {
            Err(ImportError::RowErrors(errors)) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].row, 2);
                assert_eq!(errors[0].field, "*");
                assert_eq!(errors[1].row, 4);
                assert_eq!(errors[1].field, "scheduled_quantity");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_column() {
        let data = "product_id,priority\nFG1,1\n";
        let result = ScheduleLineCsvParser.parse_reader(data.as_bytes());
        assert!(matches!(result, Err(ImportError::MissingColumn(ref c)) if c == "scheduled_quantity"));
    }

    #[test]
    fn test_parse_file_skips_empty_rows() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "Product_ID,Scheduled_Quantity").unwrap();
        writeln!(temp_file, "FG1,5").unwrap();
        writeln!(temp_file, ",").unwrap();
        writeln!(temp_file, "FG2,6").unwrap();

        let items = ScheduleLineCsvParser.parse_file(temp_file.path()).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_file_not_found() {
        let result = ScheduleLineCsvParser.parse_file(Path::new("non_existent.csv"));
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }
}
