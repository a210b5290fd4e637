//! A CLI tool for indexing a directory of DICOM files and printing the
//! resulting series index in a human readable format.

use clap::Parser;
use snafu::{prelude::*, Whatever};
use std::path::PathBuf;
use tracing::Level;
use voldex_core::{dictionary, VR};
use voldex_encoding::decode::primitive;
use voldex_index::{DatasetIndexer, ElementContext, ElementParser};

/// Index DICOM files and print the per-series contents
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// Directory of DICOM files, or individual files, to index
    #[clap(required = true)]
    paths: Vec<PathBuf>,
    /// Print every data element as it is parsed
    #[clap(short = 'd', long = "dump")]
    dump: bool,
    /// Skip pixel data decoding (metadata only)
    #[clap(long = "no-pixels")]
    no_pixels: bool,
    /// Print more log messages
    #[clap(short = 'v', long = "verbose")]
    verbose: bool,
}

/// Render a short preview of an element's value for the dump listing.
fn preview(ctx: &ElementContext) -> String {
    const PREVIEW_LIMIT: usize = 64;
    match ctx.vr {
        VR::US => primitive::read_us(ctx.bytes, ctx.endianness)
            .map(|v| v.to_string())
            .unwrap_or_default(),
        VR::SS => primitive::read_ss(ctx.bytes, ctx.endianness)
            .map(|v| v.to_string())
            .unwrap_or_default(),
        VR::UL => primitive::read_ul(ctx.bytes, ctx.endianness)
            .map(|v| v.to_string())
            .unwrap_or_default(),
        VR::FL => primitive::read_fl(ctx.bytes, ctx.endianness)
            .map(|v| v.to_string())
            .unwrap_or_default(),
        VR::OB | VR::OW | VR::UN | VR::SQ => format!("<{} bytes>", ctx.len),
        _ => {
            let text = primitive::read_str(ctx.bytes);
            if text.chars().count() > PREVIEW_LIMIT {
                let mut shortened: String = text.chars().take(PREVIEW_LIMIT).collect();
                shortened.push('…');
                shortened
            } else {
                text
            }
        }
    }
}

fn dump_element(ctx: &ElementContext) {
    let description = dictionary::by_tag(ctx.tag)
        .map(|info| info.description)
        .unwrap_or("?");
    println!(
        "{} {} [{:>6} bytes] {}: {}",
        ctx.tag,
        ctx.vr,
        ctx.len,
        description,
        preview(ctx)
    );
}

fn print_series(index: &DatasetIndexer) {
    for series in index.series_uids() {
        let series = series.as_str();
        println!("SERIES: {}", series);
        let contours = index.contours(Some(series));
        for instance in index.instances(Some(series)) {
            let file = index.file_for(instance).unwrap_or("<unknown file>");
            print!("    {} : {}", instance, file);
            if let Some((number, _)) = index
                .slice_number_pairs(Some(series))
                .iter()
                .find(|(_, f)| f == file)
            {
                print!(" [slice number {}]", number);
            }
            println!();
        }
        if !contours.is_empty() {
            println!("    {} contours", contours.len());
            for (contour, reference) in contours
                .iter()
                .zip(index.referenced_instances(Some(series)))
            {
                println!("        {} points on {}", contour.len() / 3, reference);
            }
        }
    }
}

#[snafu::report]
fn main() -> Result<(), Whatever> {
    let app = App::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(if app.verbose { Level::DEBUG } else { Level::WARN })
            .with_writer(std::io::stderr)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")?;

    let mut parser = ElementParser::new();
    DatasetIndexer::register_callbacks(&mut parser);
    if !app.no_pixels {
        DatasetIndexer::register_pixel_callback(&mut parser);
    }
    if app.dump {
        parser.register_default(|_: &mut DatasetIndexer, ctx| {
            dump_element(ctx);
            Ok(())
        });
    }

    let mut index = DatasetIndexer::new();
    let mut parsed = 0usize;
    let mut failed = 0usize;

    for path in &app.paths {
        if path.is_dir() {
            let outcome = voldex_index::scan_dir(path, &parser, &mut index)
                .with_whatever_context(|_| format!("could not scan {}", path.display()))?;
            parsed += outcome.parsed;
            failed += outcome.failed;
        } else {
            match parser.parse_file(path, &mut index) {
                Ok(()) => parsed += 1,
                Err(e) => {
                    eprintln!("{}: {}", path.display(), e);
                    failed += 1;
                }
            }
        }
    }

    print_series(&index);

    let patient = index.patient();
    if !patient.name.is_empty() || !patient.id.is_empty() {
        println!();
        println!("PATIENT: {} ({})", patient.name, patient.id);
        if !patient.modality.is_empty() {
            println!("    modality {}, study date {}", patient.modality, patient.study_date);
        }
    }

    println!();
    println!("{} files indexed, {} skipped", parsed, failed);
    Ok(())
}
