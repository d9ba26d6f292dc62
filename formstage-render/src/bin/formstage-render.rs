use formstage_core::{FormError, RendererOptions};
use formstage_render::Renderer;
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: formstage-render <form.json> [options.yaml|options.json]");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  formstage-render contact.json > contact.html");
        eprintln!("  formstage-render contact.json renderer.yaml");
        process::exit(1);
    }

    match render_file(&args[1], args.get(2).map(String::as_str)) {
        Ok(html) => print!("{}", html),
        Err(e) => {
            eprintln!("✗ {} could not be rendered:", args[1]);
            eprintln!("  {}", e);
            process::exit(1);
        }
    }
}

fn read(path: &str) -> Result<String, FormError> {
    fs::read_to_string(path)
        .map_err(|e| FormError::ValidationError(format!("Failed to read {}: {}", path, e)))
}

fn render_file(form_path: &str, options_path: Option<&str>) -> Result<String, FormError> {
    let options = match options_path {
        Some(path) if path.ends_with(".yaml") || path.ends_with(".yml") => {
            RendererOptions::from_yaml(&read(path)?)?
        }
        Some(path) => RendererOptions::from_json(&read(path)?)?,
        None => RendererOptions::default(),
    };

    let mut renderer = Renderer::new(options);
    let form = renderer.render_json(&read(form_path)?)?;
    form.page(form.form_id())
}
