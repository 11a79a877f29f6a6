//! Builtin tool implementations.

use super::{BuiltinTool, ParamSpec, ToolError};
use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use conductor_core::ToolName;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Every builtin, in allow-list order.
pub fn all() -> Vec<Arc<dyn BuiltinTool>> {
    vec![
        Arc::new(ClockTool),
        Arc::new(CityInfoTool),
        Arc::new(CalculatorTool),
        Arc::new(SystemInfoTool),
    ]
}

fn required_str<'a>(
    arguments: &'a Map<String, Value>,
    name: &'static str,
) -> Result<&'a str, ToolError> {
    match arguments.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ToolError::InvalidArgument {
            name,
            reason: format!("expected a string, got {other}"),
        }),
        None => Err(ToolError::MissingArgument(name)),
    }
}

// ---------------------------------------------------------------------------
// get_current_time
// ---------------------------------------------------------------------------

pub struct ClockTool;

#[async_trait]
impl BuiltinTool for ClockTool {
    fn name(&self) -> ToolName {
        ToolName::GetCurrentTime
    }

    fn description(&self) -> &'static str {
        "Returns the current date and time, optionally in a named timezone."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &[ParamSpec {
            name: "timezone",
            description: "Timezone name, e.g. \"UTC\" or \"Europe/Paris\" (default UTC)",
            param_type: "string",
            required: false,
        }]
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let timezone = arguments
            .get("timezone")
            .and_then(Value::as_str)
            .unwrap_or("UTC");

        let now = Utc::now();
        let (formatted, label) = if timezone.eq_ignore_ascii_case("europe/paris") {
            // Fixed UTC+1 approximation, no DST handling.
            let offset = FixedOffset::east_opt(3600).expect("one hour fits the offset range");
            (
                now.with_timezone(&offset).format("%Y-%m-%d %H:%M:%S"),
                "Europe/Paris",
            )
        } else {
            (now.format("%Y-%m-%d %H:%M:%S"), timezone)
        };

        Ok(format!("Current time: {formatted} ({label})"))
    }
}

// ---------------------------------------------------------------------------
// complex_api_call
// ---------------------------------------------------------------------------

pub struct CityInfoTool;

struct CityRecord {
    country: &'static str,
    population: &'static str,
    temperature: &'static str,
    weather: &'static str,
    timezone: &'static str,
}

const CITY_TABLE: [(&str, CityRecord); 4] = [
    (
        "paris",
        CityRecord {
            country: "France",
            population: "2,161,000",
            temperature: "15°C",
            weather: "Partly cloudy",
            timezone: "Europe/Paris",
        },
    ),
    (
        "london",
        CityRecord {
            country: "United Kingdom",
            population: "8,982,000",
            temperature: "12°C",
            weather: "Rainy",
            timezone: "Europe/London",
        },
    ),
    (
        "tokyo",
        CityRecord {
            country: "Japan",
            population: "13,960,000",
            temperature: "22°C",
            weather: "Sunny",
            timezone: "Asia/Tokyo",
        },
    ),
    (
        "new york",
        CityRecord {
            country: "United States",
            population: "8,336,000",
            temperature: "18°C",
            weather: "Cloudy",
            timezone: "America/New_York",
        },
    ),
];

#[async_trait]
impl BuiltinTool for CityInfoTool {
    fn name(&self) -> ToolName {
        ToolName::ComplexApiCall
    }

    fn description(&self) -> &'static str {
        "Looks up weather and population facts for a city via a remote service."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &[ParamSpec {
            name: "city",
            description: "City name, e.g. \"Paris\"",
            param_type: "string",
            required: true,
        }]
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let city = required_str(arguments, "city")?;

        // Simulated upstream latency.
        tokio::time::sleep(Duration::from_millis(500)).await;

        let key = city.trim().to_lowercase();
        match CITY_TABLE.iter().find(|(name, _)| *name == key) {
            Some((_, record)) => Ok(format!(
                "Information for {city}:\n\
                 Country: {}\n\
                 Population: {} inhabitants\n\
                 Temperature: {}\n\
                 Weather: {}\n\
                 Timezone: {}\n\
                 Source: Simulated Weather API",
                record.country, record.population, record.temperature, record.weather,
                record.timezone
            )),
            None => Ok(format!(
                "City {city:?} not found in the database.\n\
                 Available cities: Paris, London, Tokyo, New York"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// calculate_expression
// ---------------------------------------------------------------------------

pub struct CalculatorTool;

#[async_trait]
impl BuiltinTool for CalculatorTool {
    fn name(&self) -> ToolName {
        ToolName::CalculateExpression
    }

    fn description(&self) -> &'static str {
        "Evaluates a basic arithmetic expression, e.g. \"2 + 3 * 4\"."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &[ParamSpec {
            name: "expression",
            description: "Arithmetic expression using digits, + - * /, and parentheses",
            param_type: "string",
            required: true,
        }]
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let expression = required_str(arguments, "expression")?.trim();

        if let Some(bad) = expression
            .chars()
            .find(|c| !matches!(c, '0'..='9' | '+' | '-' | '*' | '/' | '.' | '(' | ')' | ' '))
        {
            return Err(ToolError::InvalidArgument {
                name: "expression",
                reason: format!(
                    "character {bad:?} is not allowed; only digits, + - * / . ( ) and spaces are"
                ),
            });
        }

        let result = eval_expression(expression)
            .map_err(|reason| ToolError::Failed(format!("cannot evaluate {expression:?}: {reason}")))?;

        let rendered = if result.fract() == 0.0 && result.abs() < 1e15 {
            format!("{}", result as i64)
        } else {
            format!("{result}")
        };
        Ok(format!("Calculation: {expression} = {rendered}"))
    }
}

/// Recursive-descent evaluator over `+ - * /`, parentheses, and unary
/// minus. Nothing is ever executed; this is plain parsing.
fn eval_expression(input: &str) -> Result<f64, String> {
    let chars: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser { chars, pos: 0 };
    let value = parser.expression()?;
    if parser.pos != parser.chars.len() {
        return Err(format!("unexpected character at position {}", parser.pos));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expression(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            if op == '+' {
                value += rhs;
            } else {
                value -= rhs;
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.factor()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            if op == '*' {
                value *= rhs;
            } else {
                if rhs == 0.0 {
                    return Err("division by zero".to_string());
                }
                value /= rhs;
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some('(') => {
                self.pos += 1;
                let value = self.expression()?;
                if self.peek() != Some(')') {
                    return Err("missing closing parenthesis".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            _ => self.number(),
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        let start = self.pos;
        while matches!(self.peek(), Some('0'..='9') | Some('.')) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(format!("expected a number at position {start}"));
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| format!("invalid number {literal:?}"))
    }
}

// ---------------------------------------------------------------------------
// get_system_info
// ---------------------------------------------------------------------------

pub struct SystemInfoTool;

#[async_trait]
impl BuiltinTool for SystemInfoTool {
    fn name(&self) -> ToolName {
        ToolName::GetSystemInfo
    }

    fn description(&self) -> &'static str {
        "Reports basic information about the host system."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &[]
    }

    async fn invoke(&self, _arguments: &Map<String, Value>) -> Result<String, ToolError> {
        // System probing is blocking work; keep it off the async threads.
        tokio::task::spawn_blocking(|| {
            let system = sysinfo::System::new_all();
            const GIB: u64 = 1024 * 1024 * 1024;
            format!(
                "System information:\n\
                 OS: {}\n\
                 Version: {}\n\
                 Kernel: {}\n\
                 Architecture: {}\n\
                 CPU cores: {}\n\
                 Total RAM: {} GB\n\
                 Available RAM: {} GB",
                sysinfo::System::name().unwrap_or_else(|| "unknown".into()),
                sysinfo::System::os_version().unwrap_or_else(|| "unknown".into()),
                sysinfo::System::kernel_version().unwrap_or_else(|| "unknown".into()),
                sysinfo::System::cpu_arch().unwrap_or_else(|| "unknown".into()),
                system.cpus().len(),
                system.total_memory() / GIB,
                system.available_memory() / GIB,
            )
        })
        .await
        .map_err(|e| ToolError::Failed(format!("system probe did not complete: {e}")))
    }
}
