//! Redact text matching a regular expression from a PDF.
//!
//! Usage:
//!   redact [-m|-o|-t|-q|-s|-p] pattern infile [outfile]
//!
//! The flag selects the redaction scope (match, operator, text object,
//! graphics-state block, stream, page); the default is match. With no
//! outfile the input file is edited in place through a temporary sibling.

use pdf_redact::{redact_document, PdfDocument, Scope};
use std::process::exit;

struct Args {
    scope: Scope,
    pattern: String,
    infile: String,
    outfile: Option<String>,
}

fn usage(whoami: &str) -> ! {
    eprintln!("Usage: {} [-{}] pattern infile [outfile]", whoami, Scope::FLAGS);
    exit(2);
}

fn parse_args() -> Args {
    let argv: Vec<String> = std::env::args().collect();
    let whoami = argv
        .first()
        .map(|p| {
            p.rsplit(['/', '\\'])
                .next()
                .unwrap_or("redact")
                .to_string()
        })
        .unwrap_or_else(|| "redact".to_string());

    let mut scope = Scope::Match;
    let mut positional: Vec<&String> = Vec::new();

    for arg in &argv[1..] {
        if let Some(flag) = arg.strip_prefix('-') {
            let mut chars = flag.chars();
            match (chars.next().and_then(Scope::from_flag), chars.next()) {
                (Some(s), None) => scope = s,
                _ => usage(&whoami),
            }
        } else {
            positional.push(arg);
        }
    }

    match positional.as_slice() {
        [pattern, infile] => Args {
            scope,
            pattern: (*pattern).clone(),
            infile: (*infile).clone(),
            outfile: None,
        },
        [pattern, infile, outfile] => Args {
            scope,
            pattern: (*pattern).clone(),
            infile: (*infile).clone(),
            outfile: Some((*outfile).clone()),
        },
        _ => usage(&whoami),
    }
}

fn run(args: &Args) -> pdf_redact::Result<()> {
    let pattern = regex::bytes::Regex::new(&args.pattern)?;

    let mut doc = PdfDocument::open(&args.infile)?;
    redact_document(&mut doc, &pattern, args.scope)?;

    match &args.outfile {
        Some(outfile) => doc.save(outfile)?,
        None => {
            // In-place edit: write a sibling, then rename over the input so
            // a failed run never leaves a half-written file behind
            let tmp = format!("{}~", args.infile);
            doc.save(&tmp)?;
            std::fs::rename(&tmp, &args.infile)?;
        },
    }

    Ok(())
}

fn main() {
    env_logger::init();

    let args = parse_args();
    if let Err(e) = run(&args) {
        eprintln!("redact: {}", e);
        exit(2);
    }
}
