use crate::Kinetics::errors::{ConfigurationError, IsoKinError};
use crate::Kinetics::network_parser::Network;
use crate::Kinetics::stoic_loader::StoichiometryDocument;
use crate::settings::{ModelTask, NetworkSource};
use log::{error, info, warn};
use std::fs;
use std::io;
use std::path::Path;

pub struct LoadData {
    pub file_name: String,
}

impl LoadData {
    pub fn new(file_name: String) -> Self {
        LoadData { file_name }
    }
    pub fn load_task(&self) -> Result<ModelTask, IsoKinError> {
        load_task_from_file(&self.file_name)
    }
    pub fn load_network_text(&self) -> Result<Network, IsoKinError> {
        load_network(&NetworkSource::TextFile(self.file_name.clone().into()))
    }
    pub fn load_structured(&self) -> Result<Network, IsoKinError> {
        load_network(&NetworkSource::StructuredFile(self.file_name.clone().into()))
    }
}

/// reads the whole file, reporting a missing file with its name
pub fn read_file(file_name: &str) -> Result<String, IsoKinError> {
    let path = Path::new(file_name);
    if !path.exists() {
        error!("File '{}' does not exist", file_name);
        return Err(IsoKinError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("File '{}' does not exist", file_name),
        )));
    }
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) => {
            error!("Failed to open file '{}': {}", file_name, e);
            Err(IsoKinError::Io(e))
        }
    }
}

/// Logs the line of a JSON document where parsing failed with a pointer to the column.
fn report_json_error(file_name: &str, content: &str, e: &serde_json::Error) {
    let error_line = e.line();
    let error_column = e.column();
    error!(
        "Error parsing '{}' at line {}, column {}: {}",
        file_name, error_line, error_column, e
    );
    // If possible, show the problematic line
    if let Some(problem_line) = content.lines().nth(error_line.saturating_sub(1)) {
        error!("Problematic line: {}", problem_line);
        if error_column >= 1 && error_column <= problem_line.len() + 1 {
            let pointer = " ".repeat(error_column - 1) + "^";
            error!("{}", pointer);
        }
    }
}

/// Parses a task file and validates it.
pub fn load_task_from_file(file_name: &str) -> Result<ModelTask, IsoKinError> {
    let content = read_file(file_name)?;
    if let Err(e) = serde_json::from_str::<serde_json::Value>(&content) {
        report_json_error(file_name, &content, &e);
    }
    let task = ModelTask::from_json(&content, file_name)?;
    if task.labeled_species.is_empty() {
        warn!(
            "task '{}' in '{}' labels no species, all fractions will be states",
            task.name, file_name
        );
    }
    info!("Loaded and validated task '{}' from file '{}'", task.name, file_name);
    Ok(task)
}

/// Network of a task, from inline text, a text file or a structured JSON document.
pub fn load_network(source: &NetworkSource) -> Result<Network, IsoKinError> {
    match source {
        NetworkSource::Inline(text) => Ok(Network::parse(text)?),
        NetworkSource::TextFile(path) => {
            let file_name = path.display().to_string();
            let content = read_file(&file_name)?;
            let network = Network::parse(&content).map_err(|e| {
                error!("Error parsing network file '{}': {}", file_name, e);
                e
            })?;
            info!("Successfully parsed network from file '{}'", file_name);
            Ok(network)
        }
        NetworkSource::StructuredFile(path) => {
            let file_name = path.display().to_string();
            let content = read_file(&file_name)?;
            let document = StoichiometryDocument::from_json(&content, &file_name).map_err(
                |e: ConfigurationError| {
                    if let Err(json_error) = serde_json::from_str::<serde_json::Value>(&content) {
                        report_json_error(&file_name, &content, &json_error);
                    }
                    e
                },
            )?;
            Ok(document.into_network(&file_name)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Kinetics::errors::ParseError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_task_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "{{").unwrap();
        writeln!(temp_file, "  \"name\": \"single\",").unwrap();
        writeln!(temp_file, "  \"system\": \"A + B | {{1:1}}\\nA_B : A <=> B\",").unwrap();
        writeln!(temp_file, "  \"labeled_species\": {{\"A\": {{\"1\": 1.0}}}},").unwrap();
        writeln!(temp_file, "  \"options\": {{\"emit_jacobian\": true}}").unwrap();
        writeln!(temp_file, "}}").unwrap();

        let file_path = temp_file.path().to_str().unwrap();
        let task = LoadData::new(file_path.to_owned()).load_task().unwrap();
        assert_eq!(task.name, "single");
        assert!(task.options.emit_jacobian);
        let network = load_network(&task.network_source(Path::new(".")).unwrap()).unwrap();
        assert_eq!(network.reactions[0].name, "A_B");
    }

    #[test]
    fn test_load_task_invalid_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "{{").unwrap();
        writeln!(temp_file, "  \"name\": \"broken\"").unwrap();
        writeln!(temp_file, "  \"system\": \"A => B\"").unwrap();
        writeln!(temp_file, "}}").unwrap();

        let file_path = temp_file.path().to_str().unwrap();
        let result = load_task_from_file(file_path);
        assert!(matches!(
            result,
            Err(IsoKinError::Configuration(ConfigurationError::Malformed { .. }))
        ));
    }

    #[test]
    fn test_file_not_found() {
        let result = read_file("non_existent_file.txt");
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_load_network_text_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "A + B | {{1:1}}").unwrap();
        writeln!(temp_file, "A => B").unwrap();
        let file_path = temp_file.path().to_str().unwrap();
        let network = LoadData::new(file_path.to_owned()).load_network_text().unwrap();
        assert_eq!(network.reactions[0].name, "R_A_B");

        let mut broken = NamedTempFile::new().unwrap();
        writeln!(broken, "A + B | {{1:1}}").unwrap();
        writeln!(broken, "A ? B").unwrap();
        let file_path = broken.path().to_str().unwrap();
        let result = LoadData::new(file_path.to_owned()).load_network_text();
        assert!(matches!(
            result,
            Err(IsoKinError::Parse(ParseError::UnrecognizedLine { line: 2, .. }))
        ));
    }

    #[test]
    fn test_load_structured_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"{{"species": [{{"name": "A", "atoms": 1}}, {{"name": "B", "atoms": 1}}],
                "atom_mappings": [{{"first": "A", "second": "B", "pairs": [[1, 1]]}}],
                "reactions": [{{"name": "X", "reactants": [{{"species": "A"}}],
                                "products": [{{"species": "B"}}]}}]}}"#
        )
        .unwrap();
        let file_path = temp_file.path().to_str().unwrap();
        let network = LoadData::new(file_path.to_owned()).load_structured().unwrap();
        assert_eq!(network.reactions[0].forward_rate, "fX");
        assert_eq!(network.header_lines(), vec!["A[1] + B[1] | {1:1}", "X : A => B"]);
    }
}
