// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! BOXMARK command-line tool
//!
//! Runs the collection-wide batch jobs and the training export on a
//! project directory without a display.

use anyhow::{bail, Context, Result};
use boxmark::batch::review::{sort_rows, ReviewColumn};
use boxmark::batch::{BatchOutcome, JobOutput};
use boxmark::config::Settings;
use boxmark::models::classes::ClassTable;
use boxmark::models::project::SortOrder;
use boxmark::session::Session;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the images and their annotation files
    #[arg(value_name = "PROJECT_DIR")]
    project_dir: PathBuf,

    /// Class names file, one name per line
    #[arg(long, value_name = "FILE")]
    names: Option<PathBuf>,

    /// Settings file (defaults to the user configuration directory)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Per-class mark statistics
    Stats,
    /// List every mark with its warnings and errors
    Review {
        #[arg(long, value_enum, default_value = "image")]
        sort: Column,
        /// Sort largest first
        #[arg(long)]
        descending: bool,
    },
    /// Print the image list in the given order
    Sort {
        #[arg(long, value_enum, default_value = "alphabetical")]
        order: Order,
    },
    /// Create annotation files from plain-text ones
    ImportTxt,
    /// Load and save every image's annotations
    Resave,
    /// Move images flagged as empty out of the project
    MoveEmpty,
    /// Move rotated and flipped images to the trash
    DeleteDerived,
    /// Write rotated copies of annotated images
    Rotate {
        #[arg(long, value_delimiter = ',', default_value = "90,180,270")]
        angles: Vec<u32>,
    },
    /// Write flipped copies of annotated images
    Flip {
        #[arg(long)]
        horizontal: bool,
        #[arg(long)]
        vertical: bool,
    },
    /// Write the darknet training files
    Export {
        #[arg(long, value_name = "PERCENT")]
        train_percentage: Option<u32>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Column {
    Image,
    Class,
    Size,
    Aspect,
    Overlap,
    Warnings,
    Errors,
}

impl From<Column> for ReviewColumn {
    fn from(c: Column) -> Self {
        match c {
            Column::Image => ReviewColumn::Image,
            Column::Class => ReviewColumn::Class,
            Column::Size => ReviewColumn::Size,
            Column::Aspect => ReviewColumn::AspectRatio,
            Column::Overlap => ReviewColumn::Overlap,
            Column::Warnings => ReviewColumn::Warnings,
            Column::Errors => ReviewColumn::Errors,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Order {
    Alphabetical,
    Random,
    Count,
    Timestamp,
}

impl From<Order> for SortOrder {
    fn from(o: Order) -> Self {
        match o {
            Order::Alphabetical => SortOrder::Alphabetical,
            Order::Random => SortOrder::Random,
            Order::Count => SortOrder::CountMarks,
            Order::Timestamp => SortOrder::Timestamp,
        }
    }
}

fn load_classes(args: &Args) -> Result<ClassTable> {
    let path = args
        .names
        .clone()
        .unwrap_or_else(|| args.project_dir.join(boxmark::io::export::NAMES_FILE));
    if !path.exists() {
        log::warn!("no class names at {}, using placeholder names", path.display());
        return Ok(ClassTable::new(Vec::<String>::new()));
    }
    ClassTable::from_names_file(&path).with_context(|| format!("failed to read {}", path.display()))
}

/// Poll the running job until it finishes, logging progress and
/// cancelling on Ctrl-C.
fn wait_for_job(session: &mut Session, interrupt: &Receiver<()>) -> Option<BatchOutcome<JobOutput>> {
    let mut last_done = usize::MAX;
    loop {
        if interrupt.try_recv().is_ok() {
            log::info!("interrupted, cancelling");
            session.cancel_batch();
        }
        if let Some(outcome) = session.poll_batch() {
            return Some(outcome);
        }
        if !session.is_busy() {
            return None;
        }
        if let Some(p) = session.batch_progress() {
            if p.done != last_done && p.total > 0 && (p.done % 100 == 0 || p.done == p.total) {
                log::info!("{}/{} files", p.done, p.total);
                last_done = p.done;
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn finished(outcome: Option<BatchOutcome<JobOutput>>) -> Result<JobOutput> {
    match outcome {
        Some(BatchOutcome::Completed(output)) => Ok(output),
        Some(BatchOutcome::Cancelled { processed }) => bail!("cancelled after {} files", processed),
        Some(BatchOutcome::Failed(e)) => bail!("{}", e),
        None => bail!("job ended without a result"),
    }
}

fn print_stats(output: JobOutput) {
    let JobOutput::Stats(report) = output else {
        return;
    };
    println!(
        "{} images, {} annotated, {} empty, {} unreadable",
        report.images, report.annotated, report.completely_empty, report.unreadable
    );
    println!(
        "{:>4} {:<20} {:>7} {:>7} {:>11} {:>15} {:>11} {:>15}",
        "#", "class", "marks", "images", "min", "avg", "max", "sd"
    );
    for c in &report.classes {
        println!(
            "{:>4} {:<20} {:>7} {:>7} {:>11} {:>15} {:>11} {:>15}",
            c.class_idx,
            c.name,
            c.count,
            c.images,
            format!("{}x{}", c.min_size.width, c.min_size.height),
            format!("{:.1}x{:.1}", c.avg_width, c.avg_height),
            format!("{}x{}", c.max_size.width, c.max_size.height),
            format!("{:.1}x{:.1}", c.sd_width, c.sd_height),
        );
    }
}

fn print_review(output: JobOutput, column: Column, descending: bool) {
    let JobOutput::Review(report) = output else {
        return;
    };
    let mut rows = report.rows;
    sort_rows(&mut rows, column.into(), !descending);
    for row in &rows {
        let mut notes: Vec<String> = row.errors.iter().map(|e| format!("error: {}", e)).collect();
        notes.extend(row.warnings.iter().map(|w| format!("warning: {}", w)));
        println!(
            "{} #{} {} {}x{} ratio={:.2} overlap={:.0}% {}",
            row.image.display(),
            row.mark_index,
            row.name,
            row.pixel_width,
            row.pixel_height,
            row.aspect_ratio,
            row.overlap_sum * 100.0,
            notes.join("; ")
        );
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let classes = load_classes(&args)?;
    let settings = Settings::load(args.settings.as_deref());
    let mut session = Session::open(&args.project_dir, classes, settings, None)
        .with_context(|| format!("failed to open {}", args.project_dir.display()))?;

    if matches!(args.command, Cmd::Stats | Cmd::Review { .. } | Cmd::Sort { .. }) {
        session.set_read_only(true);
    }

    let (tx, interrupt) = channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("failed to set Ctrl-C handler")?;

    match args.command {
        Cmd::Stats => {
            session.start_statistics()?;
            print_stats(finished(wait_for_job(&mut session, &interrupt))?);
        }
        Cmd::Review { sort, descending } => {
            session.start_review()?;
            print_review(finished(wait_for_job(&mut session, &interrupt))?, sort, descending);
        }
        Cmd::Sort { order } => {
            session.set_sort_order(order.into())?;
            if session.is_busy() {
                finished(wait_for_job(&mut session, &interrupt))?;
            }
            for image in session.navigator().images() {
                println!("{}", image.display());
            }
        }
        Cmd::ImportTxt => {
            session.start_import_text_annotations()?;
            finished(wait_for_job(&mut session, &interrupt))?;
        }
        Cmd::Resave => {
            session.start_reload_resave()?;
            finished(wait_for_job(&mut session, &interrupt))?;
        }
        Cmd::MoveEmpty => {
            session.start_move_empty_images()?;
            finished(wait_for_job(&mut session, &interrupt))?;
        }
        Cmd::DeleteDerived => {
            session.start_delete_rotate_and_flip()?;
            finished(wait_for_job(&mut session, &interrupt))?;
        }
        Cmd::Rotate { angles } => {
            session.start_rotate_images(angles)?;
            finished(wait_for_job(&mut session, &interrupt))?;
        }
        Cmd::Flip { horizontal, vertical } => {
            if !horizontal && !vertical {
                bail!("choose --horizontal, --vertical or both");
            }
            session.start_flip_images(horizontal, vertical)?;
            finished(wait_for_job(&mut session, &interrupt))?;
        }
        Cmd::Export { train_percentage } => {
            if let Some(p) = train_percentage {
                if p > 100 {
                    bail!("train percentage must be between 0 and 100");
                }
                session.set_train_percentage(p);
            }
            let summary = session.export_training_files()?;
            println!(
                "{} training images, {} validation images, {} without marks",
                summary.train, summary.valid, summary.skipped
            );
        }
    }

    for notice in session.take_notices() {
        eprintln!("{}: {}", notice.level, notice.text);
    }
    Ok(())
}
