// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: convert a CAD primitive dump into a classified 3D model (GLB)
//!
//! Usage:
//!   cad-to-3d <primitives.json> [options]

use anyhow::{bail, Context, Result};
use plan3d_pipeline::{
    write_glb, ClassifierContext, MaterialLibrary, Pipeline, PipelineConfig, Primitive,
};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct Args {
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    model: Option<PathBuf>,
    textures: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Some(args) = parse_args(env::args().skip(1).collect())? else {
        print_usage();
        return Ok(());
    };

    let config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => PipelineConfig::from_env().context("reading PLAN3D_* configuration")?,
    };

    let library = if args.textures {
        let library = MaterialLibrary::new(config.materials.clone());
        library.preload().context("loading material textures")?;
        library
    } else {
        MaterialLibrary::untextured(config.materials.clone())
    };

    let mut pipeline = Pipeline::new(config).with_library(Arc::new(library));
    if let Some(path) = &args.model {
        let context = ClassifierContext::load(path)
            .with_context(|| format!("loading classifier {}", path.display()))?;
        pipeline = pipeline.with_classifier(context);
    }

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let primitives: Vec<Primitive> = serde_json::from_str(&text)
        .with_context(|| format!("parsing primitives from {}", args.input.display()))?;
    tracing::info!(
        input = %args.input.display(),
        primitives = primitives.len(),
        "processing floor plan"
    );

    let output = pipeline
        .run(&primitives)
        .with_context(|| format!("processing {}", args.input.display()))?;
    write_glb(&output.model, &args.output)?;

    tracing::info!(
        rooms = output.rooms.len(),
        walls = output.wall_materials.len(),
        surfaces = output.model.surfaces.len(),
        triangles = output.model.triangle_count(),
        output = %args.output.display(),
        "done"
    );
    Ok(())
}

/// `Ok(None)` when help was requested
fn parse_args(args: Vec<String>) -> Result<Option<Args>> {
    let mut iter = args.into_iter();
    let input = match iter.next() {
        None => return Ok(None),
        Some(a) if a == "--help" || a == "-h" => return Ok(None),
        Some(a) => PathBuf::from(a),
    };

    let mut parsed = Args {
        output: input.with_extension("glb"),
        input,
        config: None,
        model: None,
        textures: false,
    };

    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .map(PathBuf::from)
                .with_context(|| format!("{name} needs a value"))
        };
        match arg.as_str() {
            "--output" | "-o" => parsed.output = value("--output")?,
            "--config" => parsed.config = Some(value("--config")?),
            "--model" => parsed.model = Some(value("--model")?),
            "--textures" => parsed.textures = true,
            other => bail!("unknown option: {other}"),
        }
    }
    Ok(Some(parsed))
}

fn print_usage() {
    eprintln!("cad-to-3d - CAD floor plan to classified 3D model");
    eprintln!();
    eprintln!("Usage: cad-to-3d <primitives.json> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o, --output <path>   GLB output (default: input with .glb extension)");
    eprintln!("  --config <path>       Pipeline configuration JSON (default: PLAN3D_* env vars)");
    eprintln!("  --model <path>        Material classifier artifact JSON (default: rules only)");
    eprintln!("  --textures            Embed material textures");
    eprintln!();
    eprintln!("Logging is controlled with RUST_LOG (default: info).");
}
