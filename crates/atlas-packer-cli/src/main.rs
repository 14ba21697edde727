use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use atlas_packer_core::config::{
    OutputFormat, PixelFormat, ResampleFilter, Settings, TextureFilter, TextureWrap,
};
use atlas_packer_core::manifest::parse_atlas;
use atlas_packer_core::{AtlasPacker, PackObserver, SourceId, SourceImage};
use clap::{ArgAction, Parser, Subcommand};
use globset::{Glob, GlobSet, GlobSetBuilder};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Luma, RgbaImage};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "atlas-packer",
    about = "Pack multi-scale images into texture atlases",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show a progress spinner (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack a folder of images into atlas pages and manifests
    Pack(PackArgs),
    /// Parse an existing .atlas manifest and print its contents
    Inspect(InspectArgs),
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    // Input/Output
    /// Input file or directory
    #[arg(help_heading = "Input/Output")]
    input: PathBuf,
    /// Output directory
    #[arg(short, long, default_value = "out", help_heading = "Input/Output")]
    out_dir: PathBuf,
    /// Pack name (files will be name.png, name2.png, name@2x.png, name.atlas, ...)
    #[arg(short, long, default_value = "pack", help_heading = "Input/Output")]
    name: String,
    /// YAML config file path (its values override the command line)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Include patterns (glob). If set, only files matching any pattern are considered
    #[arg(long, help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob). Files matching any pattern will be ignored
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,
    /// Treat a trailing `_N` in file names as the frame index
    #[arg(long, default_value_t = false, help_heading = "Input/Output")]
    use_indexes: bool,
    /// Log and skip files that fail to decode instead of aborting
    #[arg(long, default_value_t = false, help_heading = "Input/Output")]
    skip_unreadable: bool,

    // Layout
    /// Max page width
    #[arg(long, default_value_t = 1024, help_heading = "Layout")]
    max_width: u32,
    /// Max page height
    #[arg(long, default_value_t = 1024, help_heading = "Layout")]
    max_height: u32,
    /// Min page width
    #[arg(long, default_value_t = 16, help_heading = "Layout")]
    min_width: u32,
    /// Min page height
    #[arg(long, default_value_t = 16, help_heading = "Layout")]
    min_height: u32,
    /// Restrict page sizes to powers of two
    #[arg(long, default_value_t = true, action=ArgAction::Set, help_heading = "Layout")]
    pow2: bool,
    /// Force square pages
    #[arg(long, default_value_t = false, help_heading = "Layout")]
    square: bool,
    /// Allow 90 degree rotation (never applied to ninepatches)
    #[arg(long, default_value_t = false, help_heading = "Layout")]
    allow_rotation: bool,
    /// Greedy in-order packing instead of best-rectangle-next
    #[arg(long, default_value_t = false, help_heading = "Layout")]
    fast: bool,
    /// Evaluate the heuristics of one size in parallel (requires core feature `parallel`)
    #[arg(long, default_value_t = false, help_heading = "Layout")]
    parallel: bool,

    // Padding
    /// Horizontal padding between images
    #[arg(long, default_value_t = 2, help_heading = "Padding")]
    padding_x: u32,
    /// Vertical padding between images
    #[arg(long, default_value_t = 2, help_heading = "Padding")]
    padding_y: u32,
    /// Also pad the outer page edges
    #[arg(long, default_value_t = true, action=ArgAction::Set, help_heading = "Padding")]
    edge_padding: bool,
    /// Fill the padding with copies of each image's edge pixels
    #[arg(long, default_value_t = false, help_heading = "Padding")]
    duplicate_padding: bool,

    // Image Processing
    /// Output scale factors, e.g. --scales 1,2
    #[arg(long, value_delimiter = ',', default_value = "1", help_heading = "Image Processing")]
    scales: Vec<u32>,
    /// Trim transparent columns (left/right edges)
    #[arg(long, default_value_t = false, help_heading = "Image Processing")]
    strip_whitespace_x: bool,
    /// Trim transparent rows (top/bottom edges)
    #[arg(long, default_value_t = false, help_heading = "Image Processing")]
    strip_whitespace_y: bool,
    /// Alpha at or below this value counts as transparent
    #[arg(long, default_value_t = 0, help_heading = "Image Processing")]
    alpha_threshold: u8,
    /// Pack pixel-identical images once
    #[arg(long, default_value_t = true, action=ArgAction::Set, help_heading = "Image Processing")]
    alias: bool,
    /// Drop fully transparent images
    #[arg(long, default_value_t = true, action=ArgAction::Set, help_heading = "Image Processing")]
    ignore_blank_images: bool,
    /// Filter for derived scales: nearest|bilinear|bicubic
    #[arg(long, default_value = "bilinear", help_heading = "Image Processing")]
    resample: String,
    /// Premultiply alpha in the written pages
    #[arg(long, default_value_t = false, help_heading = "Image Processing")]
    premultiply_alpha: bool,
    /// Draw magenta outlines around images and pages
    #[arg(long, default_value_t = false, help_heading = "Image Processing")]
    debug: bool,

    // Export
    /// Pixel format: RGBA8888|RGBA4444|RGB888|RGB565|Alpha|Intensity|LuminanceAlpha
    #[arg(long, default_value = "RGBA8888", help_heading = "Export")]
    format: String,
    /// Minification filter written to the manifest
    #[arg(long, default_value = "Nearest", help_heading = "Export")]
    filter_min: String,
    /// Magnification filter written to the manifest
    #[arg(long, default_value = "Nearest", help_heading = "Export")]
    filter_mag: String,
    /// Horizontal wrap: clamp|repeat|mirrored
    #[arg(long, default_value = "clamp", help_heading = "Export")]
    wrap_x: String,
    /// Vertical wrap: clamp|repeat|mirrored
    #[arg(long, default_value = "clamp", help_heading = "Export")]
    wrap_y: String,
    /// Page image format: png|jpg
    #[arg(long, default_value = "png", help_heading = "Export")]
    output_format: String,
    /// JPEG quality (0..=1)
    #[arg(long, default_value_t = 0.9, help_heading = "Export")]
    jpeg_quality: f32,
    /// Manifest file extension
    #[arg(long, default_value = ".atlas", help_heading = "Export")]
    atlas_extension: String,
    /// Also write each manifest as JSON
    #[arg(long, default_value_t = false, help_heading = "Export")]
    json: bool,
    /// Export packing stats (JSON) to this file
    #[arg(long, help_heading = "Export")]
    export_stats: Option<PathBuf>,
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
    /// Dry run: pack and report but do not write files
    #[arg(long, default_value_t = false, help_heading = "Export")]
    dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
struct InspectArgs {
    /// Manifest file
    atlas: PathBuf,
    /// Print the parsed manifest as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Pack(args) => run_pack(args, cli.progress && !cli.quiet),
        Commands::Inspect(args) => run_inspect(args),
    }
}

fn run_pack(cli: &PackArgs, show_progress: bool) -> anyhow::Result<()> {
    let mut settings = settings_from_args(cli)?;
    if let Some(path) = &cli.config {
        let file = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let y: YamlConfig = serde_yaml::from_str(&file)
            .with_context(|| format!("parse config {}", path.display()))?;
        settings = y.apply(settings);
    }

    if cli.print_config {
        match cli.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&settings)?),
            _ => println!("{}", serde_json::to_string_pretty(&settings)?),
        }
        return Ok(());
    }

    let paths = gather_paths(&cli.input, &cli.include, &cli.exclude)?;
    let observer = SpinnerObserver::new(show_progress)?;
    let mut packer = AtlasPacker::new(settings.clone())?.with_observer(observer);
    let root = if cli.input.is_file() {
        cli.input.parent().unwrap_or(Path::new("")).to_path_buf()
    } else {
        cli.input.clone()
    };
    let loaded = add_inputs(&mut packer, &root, &paths, cli.use_indexes, cli.skip_unreadable)?;
    info!(files = loaded, sources = packer.len(), "loaded input images");

    let result = packer.pack(&cli.name);
    packer.observer().finish();
    let out = result?;

    let stats = out.stats();
    info!(
        pages = stats.num_pages,
        regions = stats.num_regions,
        aliases = stats.num_aliases,
        occupancy = %format!("{:.2}%", stats.occupancy * 100.0),
        "stats"
    );

    if !cli.dry_run {
        fs::create_dir_all(&cli.out_dir)
            .with_context(|| format!("create out_dir {}", cli.out_dir.display()))?;
        for scale in &out.scales {
            for page in &scale.pages {
                let path = cli.out_dir.join(&page.name);
                encode_page(&page.rgba, &settings, &path)
                    .with_context(|| format!("write {}", path.display()))?;
                info!(?path, index = page.index, scale = scale.scale, "wrote page");
            }
            let manifest_path = cli.out_dir.join(&scale.manifest_name);
            fs::write(&manifest_path, scale.manifest.to_string())
                .with_context(|| format!("write {}", manifest_path.display()))?;
            info!(?manifest_path, pages = scale.pages.len(), "atlas written");
            if cli.json {
                let json_path = manifest_path.with_extension("json");
                fs::write(&json_path, scale.manifest.to_json()?)
                    .with_context(|| format!("write {}", json_path.display()))?;
            }
        }
    }

    if cli.dry_run {
        println!("{}", stats.summary());
    } else if let Some(stats_path) = &cli.export_stats {
        fs::write(stats_path, serde_json::to_string_pretty(&stats)?)
            .with_context(|| format!("write {}", stats_path.display()))?;
        info!(?stats_path, "stats exported");
    }
    Ok(())
}

fn run_inspect(args: &InspectArgs) -> anyhow::Result<()> {
    let text = fs::read_to_string(&args.atlas)
        .with_context(|| format!("read {}", args.atlas.display()))?;
    let manifest =
        parse_atlas(&text).with_context(|| format!("parse {}", args.atlas.display()))?;
    if args.json {
        println!("{}", manifest.to_json()?);
        return Ok(());
    }
    for page in &manifest.pages {
        println!(
            "{} {}x{} {} ({} regions)",
            page.image,
            page.width,
            page.height,
            page.format,
            page.regions.len()
        );
        for r in &page.regions {
            let name = if r.index >= 0 {
                format!("{}[{}]", r.name, r.index)
            } else {
                r.name.clone()
            };
            println!(
                "  {:<32} {:>5},{:<5} {:>4}x{:<4}{}",
                name,
                r.x,
                r.y,
                r.width,
                r.height,
                if r.rotate { " rotated" } else { "" }
            );
        }
    }
    Ok(())
}

/// Decodes `paths` and registers them with `packer`. An unreadable file aborts the run
/// unless `skip_unreadable` is set, in which case it is logged and left out.
fn add_inputs<O: PackObserver>(
    packer: &mut AtlasPacker<O>,
    root: &Path,
    paths: &[PathBuf],
    use_indexes: bool,
    skip_unreadable: bool,
) -> anyhow::Result<usize> {
    let mut loaded = 0usize;
    for p in paths {
        let parsed = parse_input_name(&relative_key(root, p), use_indexes);
        let rgba = match load_image(p) {
            Ok(img) => img,
            Err(e) if skip_unreadable => {
                error!(?p, error = %e, "skip image");
                continue;
            }
            Err(e) => return Err(e.context(format!("decode {}", p.display()))),
        };
        let image = if parsed.ninepatch {
            SourceImage::ninepatch(rgba)
        } else {
            SourceImage::bitmap(rgba)
        };
        packer
            .add_image(SourceId::new(parsed.name, parsed.index), parsed.scale, image)
            .with_context(|| format!("add {}", p.display()))?;
        loaded += 1;
    }
    Ok(loaded)
}

fn parse_opt<T: std::str::FromStr>(value: &str, what: &str) -> anyhow::Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("unknown {}: {}", what, value))
}

fn settings_from_args(cli: &PackArgs) -> anyhow::Result<Settings> {
    Ok(Settings::builder()
        .padding(cli.padding_x, cli.padding_y)
        .edge_padding(cli.edge_padding)
        .duplicate_padding(cli.duplicate_padding)
        .pow2(cli.pow2)
        .square(cli.square)
        .with_min_dimensions(cli.min_width, cli.min_height)
        .with_max_dimensions(cli.max_width, cli.max_height)
        .allow_rotation(cli.allow_rotation)
        .fast(cli.fast)
        .alias(cli.alias)
        .ignore_blank_images(cli.ignore_blank_images)
        .strip_whitespace(cli.strip_whitespace_x, cli.strip_whitespace_y)
        .alpha_threshold(cli.alpha_threshold)
        .scales(cli.scales.clone())
        .format(parse_opt::<PixelFormat>(&cli.format, "pixel format")?)
        .filter(
            parse_opt::<TextureFilter>(&cli.filter_min, "filter")?,
            parse_opt::<TextureFilter>(&cli.filter_mag, "filter")?,
        )
        .wrap(
            parse_opt::<TextureWrap>(&cli.wrap_x, "wrap")?,
            parse_opt::<TextureWrap>(&cli.wrap_y, "wrap")?,
        )
        .resample(parse_opt::<ResampleFilter>(&cli.resample, "resample filter")?)
        .output_format(parse_opt::<OutputFormat>(&cli.output_format, "output format")?)
        .jpeg_quality(cli.jpeg_quality)
        .atlas_extension(cli.atlas_extension.clone())
        .premultiply_alpha(cli.premultiply_alpha)
        .debug(cli.debug)
        .parallel(cli.parallel)
        .build())
}

/// Source identity encoded in a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedName {
    name: String,
    index: i32,
    scale: u32,
    ninepatch: bool,
}

/// Splits `dir/button_3@2x.9` into name `dir/button`, index 3 (with `use_indexes`),
/// scale 2 and the ninepatch flag. `key` comes without the file extension.
fn parse_input_name(key: &str, use_indexes: bool) -> ParsedName {
    let mut name = key;
    let mut ninepatch = false;
    if let Some(stripped) = name.strip_suffix(".9") {
        name = stripped;
        ninepatch = true;
    }

    let mut scale = 1;
    if let Some((stem, suffix)) = name.rsplit_once('@') {
        if let Some(n) = suffix.strip_suffix('x').and_then(|d| d.parse::<u32>().ok()) {
            name = stem;
            scale = n;
        }
    }

    let mut index = -1;
    if use_indexes {
        if let Some((stem, digits)) = name.rsplit_once('_') {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(n) = digits.parse::<i32>() {
                    name = stem;
                    index = n;
                }
            }
        }
    }

    ParsedName {
        name: name.to_string(),
        index,
        scale,
        ninepatch,
    }
}

/// Path relative to `root`, `/`-separated, without the final extension.
fn relative_key(root: &Path, p: &Path) -> String {
    let rel = p.strip_prefix(root).unwrap_or(p);
    let rel = rel.with_extension("");
    rel.to_string_lossy().replace('\\', "/")
}

fn gather_paths(
    path: &Path,
    include: &[String],
    exclude: &[String],
) -> anyhow::Result<Vec<PathBuf>> {
    let inc_set = build_globset(include)?;
    let exc_set = build_globset(exclude)?;
    let mut list: Vec<PathBuf> = Vec::new();
    if path.is_file() {
        if !should_skip(path, inc_set.as_ref(), exc_set.as_ref()) && is_image(path) {
            list.push(path.to_path_buf());
        }
    } else {
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let p = entry.path();
            if p.is_file() && !should_skip(p, inc_set.as_ref(), exc_set.as_ref()) && is_image(p) {
                list.push(p.to_path_buf());
            }
        }
    }
    Ok(list)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for pat in patterns {
        b.add(Glob::new(pat).with_context(|| format!("bad glob {pat}"))?);
    }
    Ok(Some(b.build()?))
}

fn should_skip(p: &Path, include: Option<&GlobSet>, exclude: Option<&GlobSet>) -> bool {
    let s = p.to_string_lossy().replace('\\', "/");
    if let Some(ex) = exclude {
        if ex.is_match(&s) {
            return true;
        }
    }
    if let Some(inc) = include {
        if !inc.is_match(&s) {
            return true;
        }
    }
    false
}

fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase()),
        Some(ext) if matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "bmp" | "tga" | "gif")
    )
}

fn load_image(p: &Path) -> anyhow::Result<RgbaImage> {
    let img = ImageReader::open(p)?.with_guessed_format()?.decode()?;
    Ok(img.to_rgba8())
}

/// Converts a composed page to the configured pixel format.
fn convert_format(rgba: &RgbaImage, format: PixelFormat) -> DynamicImage {
    let img = DynamicImage::ImageRgba8(rgba.clone());
    match format {
        PixelFormat::Rgb565 | PixelFormat::Rgb888 => DynamicImage::ImageRgb8(img.to_rgb8()),
        PixelFormat::Alpha => {
            let (w, h) = rgba.dimensions();
            DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, y| {
                Luma([rgba.get_pixel(x, y)[3]])
            }))
        }
        PixelFormat::Intensity => DynamicImage::ImageLuma8(img.to_luma8()),
        PixelFormat::LuminanceAlpha => DynamicImage::ImageLumaA8(img.to_luma_alpha8()),
        PixelFormat::Rgba4444 | PixelFormat::Rgba8888 => img,
    }
}

fn encode_page(rgba: &RgbaImage, settings: &Settings, path: &Path) -> anyhow::Result<()> {
    match settings.output_format {
        OutputFormat::Png => {
            convert_format(rgba, settings.format).save_with_format(path, ImageFormat::Png)?;
        }
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(rgba.clone()).to_rgb8();
            let quality = (settings.jpeg_quality * 100.0).round().clamp(1.0, 100.0) as u8;
            let mut w = BufWriter::new(File::create(path)?);
            JpegEncoder::new_with_quality(&mut w, quality).encode_image(&rgb)?;
        }
    }
    Ok(())
}

/// Shows search progress on a spinner and routes warnings around it.
struct SpinnerObserver {
    bar: Option<ProgressBar>,
}

impl SpinnerObserver {
    fn new(show: bool) -> anyhow::Result<Self> {
        if !show {
            return Ok(Self { bar: None });
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template(
            "{spinner:.green} packing [{elapsed_precise}] {wide_msg}",
        )?);
        Ok(Self { bar: Some(bar) })
    }

    fn finish(&self) {
        if let Some(b) = &self.bar {
            b.finish_and_clear();
        }
    }
}

impl PackObserver for SpinnerObserver {
    fn on_progress(&mut self, candidate: usize) {
        if let Some(b) = &self.bar {
            b.set_message(format!("{} page sizes tried", candidate + 1));
            b.tick();
        }
    }

    fn on_warning(&mut self, source: &str, message: &str) {
        match &self.bar {
            Some(b) => b.suspend(|| warn!(source, "{}", message)),
            None => warn!(source, "{}", message),
        }
    }
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}

/// Config file: every field is optional and overrides the command line.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct YamlConfig {
    padding_x: Option<u32>,
    padding_y: Option<u32>,
    edge_padding: Option<bool>,
    duplicate_padding: Option<bool>,
    power_of_two: Option<bool>,
    square: Option<bool>,
    min_width: Option<u32>,
    min_height: Option<u32>,
    max_width: Option<u32>,
    max_height: Option<u32>,
    allow_rotation: Option<bool>,
    fast: Option<bool>,
    alias: Option<bool>,
    ignore_blank_images: Option<bool>,
    strip_whitespace_x: Option<bool>,
    strip_whitespace_y: Option<bool>,
    alpha_threshold: Option<u8>,
    scales: Option<Vec<u32>>,
    format: Option<PixelFormat>,
    filter_min: Option<TextureFilter>,
    filter_mag: Option<TextureFilter>,
    wrap_x: Option<TextureWrap>,
    wrap_y: Option<TextureWrap>,
    resample: Option<ResampleFilter>,
    output_format: Option<OutputFormat>,
    jpeg_quality: Option<f32>,
    atlas_extension: Option<String>,
    premultiply_alpha: Option<bool>,
    debug: Option<bool>,
    parallel: Option<bool>,
}

impl YamlConfig {
    fn apply(self, mut s: Settings) -> Settings {
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = self.$field {
                    s.$field = v;
                })*
            };
        }
        set!(
            padding_x,
            padding_y,
            edge_padding,
            duplicate_padding,
            power_of_two,
            square,
            min_width,
            min_height,
            max_width,
            max_height,
            allow_rotation,
            fast,
            alias,
            ignore_blank_images,
            strip_whitespace_x,
            strip_whitespace_y,
            alpha_threshold,
            scales,
            format,
            filter_min,
            filter_mag,
            wrap_x,
            wrap_y,
            resample,
            output_format,
            jpeg_quality,
            atlas_extension,
            premultiply_alpha,
            debug,
            parallel,
        );
        s
    }
}
