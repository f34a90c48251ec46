use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sfr_rs::cli::{Command, TableArgs, get_args};
use sfr_rs::config::{SmoothingConfig, adjusted_path, elevs_path};
use sfr_rs::grid::{
    CellArray, GridElevations, LayeredGrid, adjust_model_top, assign_landsurface,
};
use sfr_rs::io::csv::{load_network, write_rows_path, write_table_path};
use sfr_rs::io::report::AuditReport;
use sfr_rs::routing::assign_outlets;
use sfr_rs::{
    NetworkModel, RoutingMap, calculate_slopes, conductance, profile, smooth_segment_ends,
    smooth_segment_interiors, width,
};

fn main() -> Result<()> {
    let cli = get_args();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .init();

    let config = cli.command.smoothing_config();
    let tables = cli.command.tables();

    let mut network = load_network(&tables.mat1, &tables.mat2, tables.ncol).with_context(|| {
        format!(
            "Failed to load SFR tables {:?} and {:?}",
            tables.mat1, tables.mat2
        )
    })?;

    match &cli.command {
        Command::Smooth { landsurface, .. } => {
            if let Some(path) = landsurface {
                let grid = CellArray::from_path(path)
                    .with_context(|| format!("Failed to read land surface elevations: {:?}", path))?;
                assign_landsurface(&mut network, &grid)?;
            }
            smooth(&mut network, tables, &config)?;
        }
        Command::Widths { .. } => {
            let routing = RoutingMap::new(&network);
            width::estimate_widths(&mut network, &routing, config.to_km);
            save(&network, tables, false)?;
        }
        Command::Conductance { .. } => {
            conductance::consolidate_conductance(&mut network, config.bed_k_min);
            save(&network, tables, false)?;
        }
        Command::Outlets { .. } => {
            let routing = RoutingMap::new(&network);
            assign_outlets(&mut network, &routing);
            save(&network, tables, false)?;
        }
        Command::Profiles {
            output, model_top, ..
        } => {
            let routing = RoutingMap::new(&network);
            let grid = model_top
                .as_deref()
                .map(CellArray::from_path)
                .transpose()
                .context("Failed to read model top elevations")?;
            let rows = profile::build_profiles(
                &network,
                &routing,
                grid.as_ref().map(|g| g as &dyn GridElevations),
            )?;
            write_rows_path(&rows, output)
                .with_context(|| format!("Failed to write profiles to {:?}", output))?;
        }
        Command::AdjustTop {
            model_top,
            bottoms,
            minimum_thickness,
            summary,
            ..
        } => {
            adjust_top(
                &network,
                model_top,
                bottoms,
                *minimum_thickness,
                summary,
                tables.ncol,
            )?;
        }
    }

    Ok(())
}

fn smooth(network: &mut NetworkModel, tables: &TableArgs, config: &SmoothingConfig) -> Result<()> {
    let routing = RoutingMap::new(network);

    let mut ends_report = AuditReport::create(&config.ends_report)
        .with_context(|| format!("Failed to create report {:?}", config.ends_report))?;
    let outcome = smooth_segment_ends(network, &routing, &mut ends_report)?;
    ends_report.finish()?;

    println!("\nSegment end smoothing:");
    println!("  Iterations: {}", outcome.rounds);
    println!("  Backwards segments remaining: {}", outcome.unresolved.len());
    println!("  Report: {:?}", config.ends_report);
    if !outcome.unresolved.is_empty() {
        warn!(
            "Segments {:?} keep Min above Max; edit Mat2 or the land surface and re-run",
            outcome.unresolved
        );
    }

    let pb = ProgressBar::new(network.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({eta})")?
            .progress_chars("#>-"),
    );

    let mut interiors_report = AuditReport::create(&config.interiors_report)
        .with_context(|| format!("Failed to create report {:?}", config.interiors_report))?;
    smooth_segment_interiors(network, &mut interiors_report, &pb)?;
    interiors_report.finish()?;

    calculate_slopes(network, config.minimum_slope, config.single_reach_slope)?;

    save(network, tables, true)?;
    println!("  Interior report: {:?}", config.interiors_report);
    Ok(())
}

fn adjust_top(
    network: &NetworkModel,
    model_top: &Path,
    bottoms: &[PathBuf],
    minimum_thickness: f64,
    summary: &Path,
    ncol: Option<u32>,
) -> Result<()> {
    let top = CellArray::from_path(model_top)
        .with_context(|| format!("Failed to read model top {:?}", model_top))?;
    let bottom_arrays = bottoms
        .iter()
        .map(|path| {
            CellArray::from_path(path)
                .with_context(|| format!("Failed to read layer bottom {:?}", path))
        })
        .collect::<Result<Vec<_>>>()?;
    let mut grid = LayeredGrid::new(top, bottom_arrays)?;

    let adjustments = adjust_model_top(network, &mut grid, minimum_thickness)?;
    write_rows_path(&adjustments, summary)
        .with_context(|| format!("Failed to write adjustment summary {:?}", summary))?;

    let per_line = ncol.map_or(10, |n| n as usize);
    grid.top.to_path(per_line, &adjusted_path(model_top))?;
    for (bottom, path) in grid.bottoms.iter().zip(bottoms) {
        bottom.to_path(per_line, &adjusted_path(path))?;
    }

    println!("\nModel top adjustment:");
    println!("  Reaches moved: {}", adjustments.len());
    if let Some(largest) = adjustments.first() {
        println!(
            "  Largest change: {:.2} at segment {} reach {}",
            largest.top_height, largest.segment, largest.reach
        );
    }
    println!("  Summary: {:?}", summary);
    Ok(())
}

// Write both tables; smoothed tables default to `<name>_elevs.csv`, others overwrite the input
fn save(network: &NetworkModel, tables: &TableArgs, elevs: bool) -> Result<()> {
    let default_out = |input: &Path| -> PathBuf {
        if elevs {
            elevs_path(input)
        } else {
            input.to_path_buf()
        }
    };
    let mat1_out = tables.mat1_out.clone().unwrap_or_else(|| default_out(&tables.mat1));
    let mat2_out = tables.mat2_out.clone().unwrap_or_else(|| default_out(&tables.mat2));

    write_table_path(network.reaches(), &mat1_out)
        .with_context(|| format!("Failed to write reach table {:?}", mat1_out))?;
    write_table_path(network.segments(), &mat2_out)
        .with_context(|| format!("Failed to write segment table {:?}", mat2_out))?;

    info!("Updated Mat1 saved to {:?}; Mat2 saved to {:?}", mat1_out, mat2_out);
    Ok(())
}
