use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vista::{
    Catalog, MemoryTransport, Settings, SimpleRequest, StaticRoute, TemplatingView, View, ViewAttributes,
    ViewBase, ViewData, ViewError, ViewResponse,
};

fn read_data(path: &Path) -> Result<ViewData, ViewError> {
    let source = fs::read_to_string(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("xml") {
        Ok(ViewData::Markup(source))
    } else {
        Ok(ViewData::Structured(serde_json::from_str(&source)?))
    }
}

/// Renders a data file through a theme template and prints the response.
fn main() -> Result<(), ViewError> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 || args.len() > 5 {
        eprintln!("Renders JSON or XML data through an XSLT theme template.");
        eprintln!();
        eprintln!(
            "Usage: {} <themes-dir> <theme/template.xsl> <data.json|data.xml> [lang]",
            args[0]
        );
        eprintln!();
        eprintln!("Settings are read from $VISTA_CONFIG and VISTA__* variables.");
        std::process::exit(1);
    }

    let mut settings = Settings::load(None)?;
    settings.themes_dir = PathBuf::from(&args[1]);
    let settings = Arc::new(settings);

    // The template argument may name a theme: `dark/page.xsl`
    let mut attributes = ViewAttributes::new();
    match args[2].split_once('/') {
        Some((theme, template)) => attributes = attributes.with("theme", theme).with("xsl", template),
        None => attributes = attributes.with("xsl", args[2].as_str()),
    }

    let mut request = SimpleRequest::new();
    if let Some(lang) = args.get(4) {
        request = request.with_lang(lang.as_str());
    }

    let mut base = ViewBase::new(&StaticRoute::new(attributes), Box::new(request));
    if let Some(dir) = &settings.i18n_dir {
        base = base.with_translator(Arc::new(Catalog::from_dir(dir)?), true);
    }

    let data = read_data(Path::new(&args[3]))?;
    let mut response = ViewResponse::new(true);
    response.set_base_location(settings.base_location());

    let mut view = TemplatingView::new(base, settings.clone());
    view.prepare(&mut response)?;
    view.dispatch(&mut response, data, &[])?;

    let mut transport = MemoryTransport::new();
    response.send(&mut transport);

    if let Some(status) = transport.status {
        println!("Status: {}", status);
    }
    for (name, value) in &transport.headers {
        println!("{}: {}", name, value);
    }
    println!();
    println!("{}", transport.body);
    Ok(())
}
