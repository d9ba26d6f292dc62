use formstage_core::validator::{condition_warnings, find_orphans, validate_form_data};
use formstage_core::{FormData, FormError};
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: formstage-validate <form.json|form.yaml>");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  formstage-validate contact.json");
        eprintln!("  formstage-validate forms/*.json");
        process::exit(1);
    }

    let mut exit_code = 0;
    let files: Vec<_> = args[1..].to_vec();

    for file_path in files {
        match validate_file(&file_path) {
            Ok(warnings) => {
                println!("✓ {} is valid", file_path);
                for warning in warnings {
                    println!("  warning: {}", warning);
                }
            }
            Err(e) => {
                eprintln!("✗ {} has errors:", file_path);
                print_error(&e);
                exit_code = 1;
            }
        }
    }

    process::exit(exit_code);
}

fn validate_file(path: &str) -> Result<Vec<String>, FormError> {
    let content = fs::read_to_string(path)
        .map_err(|e| FormError::ValidationError(format!("Failed to read file: {}", e)))?;

    let data = if path.ends_with(".yaml") || path.ends_with(".yml") {
        let value: serde_json::Value = serde_yaml::from_str(&content)?;
        FormData::from_value(value)?
    } else {
        FormData::from_json(&content)?
    };
    validate_form_data(&data)?;

    let mut warnings: Vec<String> = find_orphans(&data)
        .into_iter()
        .map(|(kind, id)| format!("{} '{}' is not reachable from any stage", kind, id))
        .collect();
    warnings.extend(condition_warnings(&data));
    Ok(warnings)
}

fn print_error(error: &FormError) {
    match error {
        FormError::ParseError {
            line,
            column,
            message,
        } => {
            eprintln!("  Parse error at line {}, column {}:", line, column);
            eprintln!("    {}", message);
        }
        FormError::YamlError(msg) => {
            eprintln!("  YAML error:");
            eprintln!("    {}", msg);
        }
        FormError::ValidationError(msg) => {
            eprintln!("  Validation error:");
            eprintln!("    {}", msg);
        }
        FormError::DuplicateId { id } => {
            eprintln!("  Duplicate id '{}'", id);
            eprintln!("    Ids must be unique across stages, rows, columns and fields");
        }
        FormError::SharedChild { id, first, second } => {
            eprintln!("  Component '{}' has two parents:", id);
            eprintln!("    '{}' and '{}'", first, second);
        }
        FormError::MissingChild {
            kind,
            parent,
            child,
        } => {
            eprintln!("  {} '{}' lists a child that does not exist:", kind, parent);
            eprintln!("    '{}'", child);
        }
        FormError::InvalidChild { parent, child } => {
            eprintln!("  Invalid nesting:");
            eprintln!("    a {} cannot contain a {}", parent, child);
        }
        FormError::InvalidWidth { value } => {
            eprintln!("  Invalid column width '{}':", value);
            eprintln!("    Must be a percentage such as '50.0%'");
        }
        e => {
            eprintln!("  {}", e);
        }
    }
}
