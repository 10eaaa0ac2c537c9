mod cli;

use std::{
  path::Path,
  sync::Arc,
};

use anyhow::{
  Context,
  Result,
};
use clap::Parser;
use cli::{
  Cli,
  Command,
};
use the_lib::{
  Document,
  Store,
  StoreConfig,
  diff,
  encoding::TextEncoding,
};

fn setup_logging(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
  let level = match verbosity {
    0 => log::LevelFilter::Warn,
    1 => log::LevelFilter::Info,
    2 => log::LevelFilter::Debug,
    _ => log::LevelFilter::Trace,
  };

  let mut dispatch = fern::Dispatch::new()
    .format(|out, message, record| {
      out.finish(format_args!(
        "{} {} [{}] {}",
        chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
        record.target(),
        record.level(),
        message
      ))
    })
    .level(level)
    .chain(std::io::stderr());
  if let Some(path) = log_file {
    let file = fern::log_file(path).with_context(|| format!("opening log {}", path.display()))?;
    dispatch = dispatch.chain(file);
  }
  dispatch.apply()?;
  Ok(())
}

struct Session {
  store:  Arc<Store>,
  config: Arc<StoreConfig>,
}

impl Session {
  fn new(config: StoreConfig) -> Self {
    let store = Store::new(config.draft_dir.clone());
    Self {
      store,
      config: Arc::new(config),
    }
  }

  fn open(&self, path: &Path, encoding: Option<TextEncoding>) -> Result<Document> {
    Document::load(Arc::clone(&self.store), Arc::clone(&self.config), path, encoding)
      .with_context(|| format!("loading {}", path.display()))
  }
}

fn inspect(session: &Session, file: &Path, encoding: Option<TextEncoding>) -> Result<()> {
  let doc = session.open(file, encoding)?;
  let lines = doc.line_offsets()?;
  println!("file:     {}", file.display());
  println!("encoding: {}", doc.encoding()?);
  println!("eol:      {}", doc.eol()?);
  println!("bom:      {}", doc.bom()?);
  println!("bytes:    {}", doc.len()?);
  println!("chars:    {}", doc.len_in_chars(0, doc.len()?)?);
  println!("lines:    {}", lines.len());
  Ok(())
}

fn search(session: &Session, file: &Path, pattern: &str, regex: bool, ignore_case: bool) -> Result<()> {
  let mut doc = session.open(file, None)?;
  let len = doc.len()?;
  let mut pos = 0;
  while pos <= len {
    let found = if regex {
      doc
        .regex_find(pattern, pos, None, !ignore_case)?
        .map(|m| m.range)
    } else {
      doc.find(pattern, pos, len, !ignore_case)?
    };
    let Some(range) = found else {
      break;
    };
    let line_start = doc.line_start(range.start)?;
    let line = doc.rope()?.byte_to_line(range.start) + 1;
    let column = doc.len_in_chars(line_start, range.start)? + 1;
    println!("{}:{line}:{column}: {}", file.display(), doc.text_range(range.start, range.end)?);
    pos = if range.is_empty() {
      doc.next_char_pos(range.end)?.max(range.end + 1)
    } else {
      range.end
    };
  }
  Ok(())
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  setup_logging(cli.verbosity, cli.log_file.as_deref())?;

  let config = match &cli.config_file {
    Some(path) => StoreConfig::load(path)?,
    None => StoreConfig::default(),
  };
  let session = Session::new(config);

  match cli.command {
    Command::Inspect { file, encoding } => inspect(&session, &file, encoding),
    Command::Convert {
      src,
      dst,
      from,
      to,
      eol,
      bom,
      no_bom,
    } => {
      let mut doc = session.open(&src, from)?;
      if let Some(to) = to {
        doc.set_encoding(to)?;
      }
      if let Some(eol) = eol {
        doc.set_eol(eol)?;
      }
      if bom || no_bom {
        doc.set_bom(bom)?;
      }
      doc
        .save(&dst, false)
        .with_context(|| format!("saving {}", dst.display()))?;
      log::info!("converted {} to {}", src.display(), dst.display());
      Ok(())
    },
    Command::Search {
      file,
      pattern,
      regex,
      ignore_case,
    } => search(&session, &file, &pattern, regex, ignore_case),
    Command::Diff { old, new } => {
      let before = session.open(&old, None)?.rope()?;
      let after = session.open(&new, None)?.rope()?;
      let matches = diff::compare_texts(&before, &after);
      for line in diff::changed_lines(&matches, &after) {
        println!("{}", line + 1);
      }
      Ok(())
    },
  }
}
