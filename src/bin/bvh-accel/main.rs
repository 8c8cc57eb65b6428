//! bvh-accel CLI - Build, inspect and measure flattened BVHs for OBJ meshes.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use bvh_accel::bvh::{build_bvh, flatten, BvhStats, FlatBvh};
use bvh_accel::config::{Settings, SETTINGS_FILE};
use bvh_accel::geometry::{merge_meshes, Merged, Mesh};
use bvh_accel::io;
use bvh_accel::texture::{ShaderDefines, TextureLayout};

/// Verbosity selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verbosity {
    Quiet,
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    fn filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
            Verbosity::Trace => "trace",
        }
    }
}

/// Parsed command line, global flags stripped.
struct Args {
    verbosity: Verbosity,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    json: bool,
    positional: Vec<String>,
}

fn parse_args(raw: &[String]) -> anyhow::Result<Args> {
    let mut args = Args {
        verbosity: Verbosity::Info,
        config: None,
        output: None,
        json: false,
        positional: Vec::new(),
    };

    let mut it = raw.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-v" | "--verbose" => args.verbosity = Verbosity::Debug,
            "-vv" | "--trace" => args.verbosity = Verbosity::Trace,
            "-q" | "--quiet" => args.verbosity = Verbosity::Quiet,
            "-j" | "--json" => args.json = true,
            "-c" | "--config" => {
                let Some(path) = it.next() else {
                    bail!("--config needs a file argument");
                };
                args.config = Some(PathBuf::from(path));
            }
            "-o" | "--output" => {
                let Some(path) = it.next() else {
                    bail!("-o needs a file argument");
                };
                args.output = Some(PathBuf::from(path));
            }
            _ => args.positional.push(arg.clone()),
        }
    }

    Ok(args)
}

#[cfg(feature = "chrome-trace")]
fn init_tracing(verbosity: Verbosity) -> Option<tracing_chrome::FlushGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter()));
    let fmt = tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter).with(fmt);

    if env::var("BVH_TRACE").ok().as_deref() != Some("1") {
        let _ = registry.try_init();
        return None;
    }

    let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .file("trace.json")
        .build();
    if registry.with(chrome_layer).try_init().is_err() {
        return None;
    }

    Some(guard)
}

#[cfg(not(feature = "chrome-trace"))]
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter()));
    let fmt = tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr);
    let _ = tracing_subscriber::registry().with(filter).with(fmt).try_init();
}

fn main() {
    let raw: Vec<String> = env::args().skip(1).collect();

    let args = match parse_args(&raw) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    #[allow(clippy::let_unit_value)]
    let _trace_guard = init_tracing(args.verbosity);

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let Some(command) = args.positional.first() else {
        print_help();
        return Ok(());
    };

    match command.as_str() {
        "build" | "b" => {
            let input = file_arg(args, "build <mesh.obj> [-o out.bvh]")?;
            cmd_build(input, args.output.as_deref(), &load_settings(args)?)
        }
        "stats" | "s" => {
            let input = file_arg(args, "stats <mesh.obj> [--json]")?;
            cmd_stats(input, args.json, &load_settings(args)?)
        }
        "inspect" | "i" => {
            let input = file_arg(args, "inspect <file.bvh>")?;
            cmd_inspect(input, args.json)
        }
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" => {
            print_version();
            Ok(())
        }
        other => {
            print_help();
            bail!("unknown command: {}", other)
        }
    }
}

/// Only the commands that build a tree read the settings file.
fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let config = args.config.clone().unwrap_or_else(|| PathBuf::from(SETTINGS_FILE));
    Settings::load(&config).with_context(|| format!("failed to load settings from {}", config.display()))
}

fn file_arg<'a>(args: &'a Args, usage: &str) -> anyhow::Result<&'a Path> {
    match args.positional.get(1) {
        Some(p) => Ok(Path::new(p)),
        None => bail!("missing file argument\nUsage: bvh-accel {}", usage),
    }
}

fn print_help() {
    println!("bvh-accel - SAH BVH builder for GPU path tracing");
    println!();
    println!("USAGE:");
    println!("    bvh-accel [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    b, build   <mesh.obj> [-o out.bvh]   Build and write a flattened BVH");
    println!("    s, stats   <mesh.obj> [--json]       Build and print tree statistics");
    println!("    i, inspect <file.bvh> [--json]       Validate a flattened BVH file");
    println!("    h, help                              Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose          Show debug output");
    println!("    -vv, --trace           Show trace output (very verbose)");
    println!("    -q, --quiet            Only show warnings and errors");
    println!("    -c, --config <file>    Settings file (default: {})", SETTINGS_FILE);
    println!("    -V, --version          Show version and build date");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG               Overrides the log filter");
    println!("    BVH_TRACE=1            Write trace.json (chrome-trace feature)");
}

fn print_version() {
    println!(
        "bvh-accel {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        env!("BVH_ACCEL_BUILD_DATE"),
        env!("BVH_ACCEL_BUILD_TIME"),
    );
}

/// Load every model of an OBJ file and merge them into one scene.
fn load_obj(path: &Path, settings: &Settings) -> anyhow::Result<Merged<i32>> {
    let (models, _) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: settings.triangulate,
            ..Default::default()
        },
    )
    .with_context(|| format!("failed to load {}", path.display()))?;

    let meshes: Vec<Mesh<i32>> = models
        .into_iter()
        .filter(|model| !model.mesh.indices.is_empty())
        .map(|model| {
            tracing::debug!(name = %model.name, tris = model.mesh.indices.len() / 3, "mesh");
            let m = model.mesh;
            let material = m
                .material_id
                .map(|id| id as i32)
                .unwrap_or(settings.default_material);

            let mut mesh = Mesh::new(m.positions, material).with_indices(m.indices);
            if !m.normals.is_empty() {
                mesh = mesh.with_normals(m.normals);
            }
            if !m.texcoords.is_empty() {
                mesh = mesh.with_uvs(m.texcoords);
            }
            mesh
        })
        .collect();

    let merged = merge_meshes(&meshes).with_context(|| format!("failed to merge meshes from {}", path.display()))?;
    Ok(merged)
}

/// Summary written next to a built BVH and printed by `stats --json`.
#[derive(Debug, Serialize)]
struct BuildReport {
    input: PathBuf,
    triangles: usize,
    vertices: usize,
    materials: usize,
    records: u32,
    build_ms: f64,
    stats: BvhStats,
    layout: TextureLayout,
    defines: ShaderDefines,
}

fn build_scene(input: &Path, settings: &Settings) -> anyhow::Result<(FlatBvh, BuildReport)> {
    let merged = load_obj(input, settings)?;
    let geometry = &merged.geometry;
    tracing::info!(
        triangles = geometry.triangle_count(),
        vertices = geometry.vertex_count(),
        materials = merged.materials.len(),
        "loaded {}",
        input.display()
    );

    let start = Instant::now();
    let root = build_bvh(geometry)?;
    let flat = flatten(&root);
    let build_ms = start.elapsed().as_secs_f64() * 1000.0;

    let report = BuildReport {
        input: input.to_path_buf(),
        triangles: geometry.triangle_count(),
        vertices: geometry.vertex_count(),
        materials: merged.materials.len(),
        records: flat.count(),
        build_ms,
        stats: BvhStats::from_node(&root),
        layout: flat.texture_layout(),
        defines: flat.shader_defines(),
    };
    tracing::info!(
        records = flat.count(),
        max_depth = flat.max_depth(),
        "built in {:.2} ms",
        build_ms
    );

    Ok((flat, report))
}

fn cmd_build(input: &Path, output: Option<&Path>, settings: &Settings) -> anyhow::Result<()> {
    let (flat, report) = build_scene(input, settings)?;

    let output = match output {
        Some(p) => p.to_path_buf(),
        None => {
            let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("scene");
            settings.output_path(input, &format!("{}.bvh", stem))
        }
    };
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    io::save_flat(&output, &flat).with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!("wrote {}", output.display());

    if settings.pad_to_texture {
        let tex = output.with_extension("tex");
        io::save_texture_data(&tex, &flat).with_context(|| format!("failed to write {}", tex.display()))?;
        tracing::info!(
            columns = report.layout.columns,
            rows = report.layout.rows,
            "wrote {}",
            tex.display()
        );
    }

    if settings.write_report {
        let path = output.with_extension("json");
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("wrote {}", path.display());
    }

    Ok(())
}

fn cmd_stats(input: &Path, json: bool, settings: &Settings) -> anyhow::Result<()> {
    let (_, report) = build_scene(input, settings)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let s = &report.stats;
    println!("Mesh: {}", input.display());
    println!("  Triangles: {}", report.triangles);
    println!("  Vertices:  {}", report.vertices);
    println!("  Materials: {}", report.materials);
    println!();
    println!("BVH:");
    println!("  Nodes:     {} ({} interior, {} leaves)", s.nodes, s.interior_nodes, s.leaves);
    println!("  Max leaf:  {}", s.max_leaf_size);
    println!("  Max depth: {}", s.max_depth);
    println!("  Mean leaf depth: {:.2}", s.mean_leaf_depth);
    println!("  Root area: {:.4}", s.root_surface_area);
    println!("  Build:     {:.2} ms", report.build_ms);
    println!();
    print_layout(report.records, &report.layout, &report.defines);

    Ok(())
}

fn cmd_inspect(input: &Path, json: bool) -> anyhow::Result<()> {
    let flat = io::load_flat(input).with_context(|| format!("failed to read {}", input.display()))?;
    let summary = flat
        .validate()
        .with_context(|| format!("{} is not a valid BVH", input.display()))?;
    let layout = flat.texture_layout();
    let defines = flat.shader_defines();

    if json {
        let value = serde_json::json!({
            "file": input,
            "records": flat.count(),
            "max_depth": flat.max_depth(),
            "interior_nodes": summary.interior_nodes,
            "leaves": summary.leaves,
            "leaf_records": summary.leaf_records,
            "layout": layout,
            "defines": defines,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("File: {}", input.display());
    println!("  Interior:  {}", summary.interior_nodes);
    println!("  Leaves:    {} ({} triangles)", summary.leaves, summary.leaf_records);
    println!("  Max depth: {}", flat.max_depth());
    println!();
    print_layout(flat.count(), &layout, &defines);

    Ok(())
}

fn print_layout(records: u32, layout: &TextureLayout, defines: &ShaderDefines) {
    println!("Texture:");
    println!("  Records:   {} ({} texels)", records, records * 2);
    println!("  Size:      {} x {} ({} texels)", layout.columns, layout.rows, layout.size);
    println!("  Defines:   BVH_COLUMNS={} STACK_SIZE={}", defines.bvh_columns, defines.stack_size);
}
