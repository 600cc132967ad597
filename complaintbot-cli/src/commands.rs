//! Subcommand bodies. Each writes its report to `out` so it can be driven
//! from tests as well as from `main`.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, bail};
use complaintbot_rag::{
    Answer, CollectionInfo, IndexReport, QueryHit, RagError, RagPipeline, evaluate, preview,
    render_markdown,
};
use tracing::info;

/// Characters of chunk text shown per hit by `query`.
pub const PREVIEW_CHARS: usize = 150;

/// Fail with a hint to run `index` when the collection does not exist yet.
pub async fn require_collection(pipeline: &RagPipeline) -> anyhow::Result<CollectionInfo> {
    match pipeline.collection_info().await? {
        Some(info) => Ok(info),
        None => bail!(
            "collection '{}' not found in {}; run `complaintbot index` first",
            pipeline.config().collection_name,
            pipeline.config().db_path.display()
        ),
    }
}

/// Load, clean and index `data`, creating the collection if needed.
pub async fn index<W: Write>(
    pipeline: &RagPipeline,
    data: &Path,
    rebuild: bool,
    out: &mut W,
) -> anyhow::Result<IndexReport> {
    if rebuild && pipeline.collection_info().await?.is_some() {
        info!(
            collection = %pipeline.config().collection_name,
            "dropping collection before rebuild"
        );
        pipeline.delete_collection().await?;
    }
    pipeline.create_collection().await?;

    let report = pipeline
        .index_csv(data)
        .await
        .with_context(|| format!("failed to index {}", data.display()))?;
    writeln!(out, "Indexed {} into '{}'", data.display(), pipeline.config().collection_name)?;
    writeln!(out, "{report}")?;
    Ok(report)
}

fn write_hit<W: Write>(out: &mut W, rank: usize, hit: &QueryHit) -> std::io::Result<()> {
    writeln!(
        out,
        "{rank}. {}  distance={:.4}  product={}  complaint_id={}",
        hit.id, hit.distance, hit.metadata.product, hit.metadata.complaint_id
    )?;
    writeln!(out, "   {}", preview(&hit.text, PREVIEW_CHARS))
}

/// Print the chunks nearest to `text`.
pub async fn query<W: Write>(
    pipeline: &RagPipeline,
    text: &str,
    k: Option<usize>,
    out: &mut W,
) -> anyhow::Result<Vec<QueryHit>> {
    require_collection(pipeline).await?;
    let k = k.unwrap_or(pipeline.config().top_k);
    let hits = pipeline.retrieve(text, k).await?;

    if hits.is_empty() {
        writeln!(out, "No documents found.")?;
    }
    for (i, hit) in hits.iter().enumerate() {
        write_hit(out, i + 1, hit)?;
    }
    Ok(hits)
}

/// Print numbered sources, in retrieval order.
pub fn write_sources<W: Write>(out: &mut W, sources: &[String]) -> std::io::Result<()> {
    if sources.is_empty() {
        return writeln!(out, "Sources: none retrieved");
    }
    writeln!(out, "Sources:")?;
    for (i, source) in sources.iter().enumerate() {
        writeln!(out, "[{}] {}", i + 1, source)?;
    }
    Ok(())
}

/// Answer `question` and print the answer followed by its sources.
///
/// If generation fails, the sources retrieved beforehand are still printed
/// before the error is returned.
pub async fn ask<W: Write>(
    pipeline: &RagPipeline,
    question: &str,
    k: Option<usize>,
    out: &mut W,
) -> anyhow::Result<Answer> {
    require_collection(pipeline).await?;
    let k = k.unwrap_or(pipeline.config().top_k);

    match pipeline.answer_with_k(question, k).await {
        Ok(answer) => {
            writeln!(out, "{}\n", answer.answer)?;
            write_sources(out, &answer.sources)?;
            Ok(answer)
        }
        Err(RagError::GenerationFailed { sources, source }) => {
            write_sources(out, &sources)?;
            Err(anyhow::Error::new(*source).context("answer generation failed"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Read evaluation questions: one per non-blank line, `#` starts a comment line.
pub fn read_questions(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read questions from {}", path.display()))?;
    let questions: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();
    if questions.is_empty() {
        bail!("no questions found in {}", path.display());
    }
    Ok(questions)
}

/// Answer every question and write the Markdown evaluation table.
pub async fn eval<W: Write>(
    pipeline: &RagPipeline,
    questions: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    require_collection(pipeline).await?;
    let rows = evaluate(pipeline, questions).await;
    let failed = rows.iter().filter(|row| row.error.is_some()).count();
    info!(questions = rows.len(), failed, "evaluation finished");
    out.write_all(render_markdown(&rows).as_bytes())?;
    Ok(())
}

/// Describe the configured collection.
pub async fn status<W: Write>(
    pipeline: &RagPipeline,
    out: &mut W,
) -> anyhow::Result<Option<CollectionInfo>> {
    let config = pipeline.config();
    writeln!(out, "Store:      {}", config.db_path.display())?;

    let Some(info) = pipeline.collection_info().await? else {
        writeln!(
            out,
            "Collection: {} (not created; run `complaintbot index`)",
            config.collection_name
        )?;
        return Ok(None);
    };

    writeln!(out, "Collection: {}", info.name)?;
    writeln!(out, "Metric:     {}", info.metric)?;
    match info.dimensions {
        Some(dims) => writeln!(out, "Dimensions: {dims}")?,
        None => writeln!(out, "Dimensions: unset")?,
    }
    writeln!(out, "Documents:  {}", info.count)?;
    if info.count == 0 {
        writeln!(out, "Warning: the collection is empty; answers will have no context.")?;
    }
    Ok(Some(info))
}
