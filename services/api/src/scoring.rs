use crate::infra::read_json;
use clap::Args;
use coalition_eval::error::AppError;
use coalition_eval::workflows::evaluation::{
    catalog_view, score_preview, CatalogView, EvaluationData, MetricsPayload, ScorePreview,
};
use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Performance metrics export (JSON, with or without a `data` envelope)
    #[arg(long)]
    pub(crate) metrics: PathBuf,
    /// Optional manual scores in `evaluation_data` form; non-zero entries override auto scores
    #[arg(long)]
    pub(crate) scores: Option<PathBuf>,
    /// Emit one CSV row per criterion instead of the readable breakdown
    #[arg(long)]
    pub(crate) csv: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct CriteriaArgs {
    /// Emit the catalog as CSV
    #[arg(long)]
    pub(crate) csv: bool,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs {
        metrics,
        scores,
        csv,
    } = args;

    let metrics = read_json::<MetricsPayload>(&metrics)?.into_snapshot();
    let overrides = scores
        .map(|path| read_json::<EvaluationData>(&path))
        .transpose()?;
    let preview = score_preview(&metrics, overrides.as_ref())?;

    if csv {
        write_preview_csv(&preview, io::stdout().lock())
    } else {
        print!("{}", render_preview(&preview));
        Ok(())
    }
}

pub(crate) fn run_criteria(args: CriteriaArgs) -> Result<(), AppError> {
    let catalog = catalog_view();
    if args.csv {
        write_catalog_csv(&catalog, io::stdout().lock())
    } else {
        print!("{}", render_catalog(&catalog));
        Ok(())
    }
}

pub(crate) fn render_preview(preview: &ScorePreview) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Evaluation preview");

    for category in &preview.categories {
        let _ = writeln!(
            out,
            "\n{} (weight {:.0}%)",
            category.category,
            category.weight * 100.0
        );
        for row in preview
            .criteria
            .iter()
            .filter(|row| row.category == category.category)
        {
            let level = row.level.map(|level| level.label()).unwrap_or("Unscored");
            let _ = writeln!(
                out,
                "  [{}] {} / {}: {} ({})",
                row.score,
                row.section.label(),
                row.index + 1,
                row.text,
                level
            );
            if let Some(basis) = row.metric_basis {
                let _ = writeln!(out, "      {basis} (auto {})", row.auto_score);
            }
        }
        let _ = writeln!(
            out,
            "  Category average {:.2} -> weighted {:.2} ({}/{} scored)",
            category.average, category.weighted, category.scored, category.criteria
        );
    }

    let _ = writeln!(out, "\nTotal score: {:.2}", preview.total_score);
    if preview.missing.is_empty() {
        let _ = writeln!(out, "All criteria scored; ready to submit.");
    } else {
        let _ = writeln!(
            out,
            "{} criteria still need a manual score.",
            preview.missing.len()
        );
    }
    out
}

pub(crate) fn write_preview_csv<W: io::Write>(
    preview: &ScorePreview,
    writer: W,
) -> Result<(), AppError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([
        "category",
        "section",
        "index",
        "criterion",
        "metric_basis",
        "auto_score",
        "score",
        "level",
    ])
    .map_err(io::Error::from)?;

    for row in &preview.criteria {
        let index = row.index.to_string();
        let auto_score = row.auto_score.to_string();
        let score = row.score.to_string();
        csv.write_record([
            row.category.label(),
            row.section.label(),
            index.as_str(),
            row.text,
            row.metric_basis.unwrap_or(""),
            auto_score.as_str(),
            score.as_str(),
            row.level.map(|level| level.label()).unwrap_or(""),
        ])
        .map_err(io::Error::from)?;
    }

    csv.flush()?;
    Ok(())
}

pub(crate) fn render_catalog(catalog: &CatalogView) -> String {
    let mut out = String::new();
    for category in &catalog.categories {
        let _ = writeln!(
            out,
            "{} (weight {:.0}%)",
            category.category,
            category.weight * 100.0
        );
        for section in &category.sections {
            let _ = writeln!(out, "  {}", section.label);
            for entry in &section.criteria {
                let basis = entry.metric_basis.unwrap_or("Manual scoring");
                let _ = writeln!(out, "    {}. {} [{}]", entry.index + 1, entry.text, basis);
            }
        }
    }
    out
}

pub(crate) fn write_catalog_csv<W: io::Write>(
    catalog: &CatalogView,
    writer: W,
) -> Result<(), AppError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["category", "weight", "section", "index", "criterion", "metric_basis"])
        .map_err(io::Error::from)?;

    for category in &catalog.categories {
        let weight = category.weight.to_string();
        for section in &category.sections {
            for entry in &section.criteria {
                let index = entry.index.to_string();
                csv.write_record([
                    category.category.label(),
                    weight.as_str(),
                    section.label,
                    index.as_str(),
                    entry.text,
                    entry.metric_basis.unwrap_or(""),
                ])
                .map_err(io::Error::from)?;
            }
        }
    }

    csv.flush()?;
    Ok(())
}
