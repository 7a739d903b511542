use std::io::Write;

use miette::IntoDiagnostic;
use mirra_backup::Restored;
use mirra_core::Representation;
use mirra_operations::SyncContext;
use tracing::info;

/// Prints the document the backup records of `name` describe.
pub async fn restore_package(ctx: &SyncContext, name: &str) -> miette::Result<()> {
    let restored = mirra_backup::restore(ctx.blobs().as_ref(), name).await?;

    let json = match restored {
        Restored::Document(doc) => serde_json::to_string_pretty(&doc),
        Restored::Unpublished(record) => serde_json::to_string_pretty(&record),
    }
    .into_diagnostic()?;

    println!("{json}");
    Ok(())
}

pub async fn show_package(ctx: &SyncContext, name: &str, abbreviated: bool) -> miette::Result<()> {
    let representation = if abbreviated {
        Representation::Abbreviated
    } else {
        Representation::Full
    };

    let Some(rendered) = mirra_core::render(ctx.packages().as_ref(), name, representation).await?
    else {
        info!("{name} is not in the local store");
        return Ok(());
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&rendered.body).into_diagnostic()?;
    writeln!(stdout).into_diagnostic()?;
    eprintln!("ETag: {}", rendered.etag);
    Ok(())
}

pub async fn print_log(ctx: &SyncContext, log_id: &str) -> miette::Result<()> {
    let lines = ctx.logs().read(log_id).await?;
    if lines.is_empty() {
        info!("no log recorded under {log_id}");
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}
