//! Interactive viewing session.
//!
//! Reads one command per line and applies it to a [`ViewerController`].
//! Viewer errors are reported and the session keeps going; only I/O
//! failures on the session streams end it early.

use anyhow::Result;
use pdf_engine::PdfEngine;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use viewer_core::{AccentColor, ViewerController, ViewerError};

const FRAME_TIMEOUT: Duration = Duration::from_secs(30);

const HELP: &str = "\
commands:
  next | prev              move one page
  goto N                   jump to page N
  zoom-in | zoom-out       step the zoom
  zoom F                   set the zoom factor
  rotate                   rotate 90 degrees clockwise
  bookmark                 bookmark the current page
  bookmarks                list bookmarks
  jump I                   go to bookmark I (as listed)
  search TEXT              search the current page
  night                    toggle night mode
  accent NAME              blue, green, red, purple or orange
  fullscreen               toggle fullscreen
  info                     document details
  save PATH                write the current page as PNG
  download PATH            write the original PDF
  quit";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Next,
    Prev,
    Goto(u32),
    ZoomIn,
    ZoomOut,
    Zoom(f32),
    Rotate,
    Bookmark,
    Bookmarks,
    Jump(usize),
    Search(String),
    Night,
    Accent(AccentColor),
    Fullscreen,
    Info,
    Save(PathBuf),
    Download(PathBuf),
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "" => return Ok(None),
            "next" | "n" => Self::Next,
            "prev" | "p" => Self::Prev,
            "goto" | "g" => Self::Goto(parse_arg(word, rest)?),
            "zoom-in" | "+" => Self::ZoomIn,
            "zoom-out" | "-" => Self::ZoomOut,
            "zoom" => Self::Zoom(parse_arg(word, rest)?),
            "rotate" | "r" => Self::Rotate,
            "bookmark" | "b" => Self::Bookmark,
            "bookmarks" => Self::Bookmarks,
            "jump" => Self::Jump(parse_arg(word, rest)?),
            // blank terms reach the viewer so it can reject them
            "search" | "/" => Self::Search(rest.to_owned()),
            "night" => Self::Night,
            "accent" => Self::Accent(rest.parse().map_err(|err| format!("{err}"))?),
            "fullscreen" | "f" => Self::Fullscreen,
            "info" | "i" => Self::Info,
            "save" => Self::Save(path_arg(word, rest)?),
            "download" => Self::Download(path_arg(word, rest)?),
            "help" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            other => return Err(format!("unknown command `{other}` (try `help`)")),
        };

        Ok(Some(command))
    }
}

fn parse_arg<T: std::str::FromStr>(command: &str, arg: &str) -> Result<T, String> {
    arg.parse().map_err(|_| format!("`{command}` needs a number, got `{arg}`"))
}

fn path_arg(command: &str, arg: &str) -> Result<PathBuf, String> {
    if arg.is_empty() {
        return Err(format!("`{command}` needs a path"));
    }
    Ok(PathBuf::from(arg))
}

/// A viewing session writing its responses to `out`.
pub struct Session<E, W>
where
    E: PdfEngine + Send + Sync + 'static,
{
    viewer: ViewerController<E>,
    out: W,
}

impl<E, W> Session<E, W>
where
    E: PdfEngine + Send + Sync + 'static,
    W: Write,
{
    pub fn new(viewer: ViewerController<E>, out: W) -> Self {
        Self { viewer, out }
    }

    pub fn viewer(&self) -> &ViewerController<E> {
        &self.viewer
    }

    /// Processes commands until `quit` or end of input.
    pub fn run<R: BufRead>(&mut self, input: R) -> Result<()> {
        let shown = self.show_frame();
        self.report(shown)?;

        for line in input.lines() {
            let command = match Command::parse(&line?) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(message) => {
                    writeln!(self.out, "error: {message}")?;
                    continue;
                }
            };

            if command == Command::Quit {
                break;
            }

            let applied = self.apply(command);
            self.report(applied)?;
        }

        self.out.flush()?;
        Ok(())
    }

    /// Prints viewer errors and carries on; output failures end the session.
    fn report(&mut self, result: Result<(), SessionError>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(SessionError::Viewer(err)) => Ok(writeln!(self.out, "error: {err}")?),
            Err(SessionError::Output(err)) => Err(err),
        }
    }

    fn apply(&mut self, command: Command) -> Result<(), SessionError> {
        match command {
            Command::Next => {
                if !self.viewer.next_page()? {
                    writeln!(self.out, "already on the last page")?;
                }
                self.show_frame()?;
            }
            Command::Prev => {
                if !self.viewer.previous_page()? {
                    writeln!(self.out, "already on the first page")?;
                }
                self.show_frame()?;
            }
            Command::Goto(page) => {
                self.viewer.go_to_page(page)?;
                self.show_frame()?;
            }
            Command::ZoomIn => {
                let changed = self.viewer.zoom_in()?;
                self.after_zoom(changed)?;
            }
            Command::ZoomOut => {
                let changed = self.viewer.zoom_out()?;
                self.after_zoom(changed)?;
            }
            Command::Zoom(factor) => {
                let changed = self.viewer.set_zoom(factor)?;
                self.after_zoom(changed)?;
            }
            Command::Rotate => {
                self.viewer.rotate()?;
                self.show_frame()?;
            }
            Command::Bookmark => {
                let page = self.viewer.add_bookmark()?;
                writeln!(self.out, "bookmarked page {page}")?;
            }
            Command::Bookmarks => {
                if self.viewer.bookmarks().is_empty() {
                    writeln!(self.out, "no bookmarks")?;
                }
                for (index, page) in self.viewer.bookmarks().iter().enumerate() {
                    writeln!(self.out, "{}: page {page}", index + 1)?;
                }
            }
            Command::Jump(position) => {
                let index = position.checked_sub(1).ok_or(ViewerError::BookmarkOutOfRange {
                    index: position,
                    count: self.viewer.bookmarks().len(),
                })?;
                self.viewer.jump_to_bookmark(index)?;
                self.show_frame()?;
            }
            Command::Search(query) => {
                let outcome = self.viewer.search(&query)?;
                let verdict = if outcome.found { "found" } else { "not found" };
                writeln!(self.out, "\"{}\" {verdict} on page {}", outcome.query, outcome.page)?;
            }
            Command::Night => {
                let enabled = self.viewer.toggle_night_mode();
                writeln!(self.out, "night mode {}", on_off(enabled))?;
            }
            Command::Accent(accent) => {
                self.viewer.set_accent(accent);
                writeln!(self.out, "accent {accent} ({})", accent.hex())?;
            }
            Command::Fullscreen => {
                let enabled = self.viewer.toggle_fullscreen();
                writeln!(self.out, "fullscreen {}", on_off(enabled))?;
            }
            Command::Info => self.show_info()?,
            Command::Save(path) => {
                self.viewer.wait_idle(FRAME_TIMEOUT)?;
                let image = self.viewer.presented_frame().ok_or(ViewerError::NotLoaded)?;
                crate::save_png(&image, &path).map_err(SessionError::Output)?;
                writeln!(self.out, "saved page {} to {}", self.page(), path.display())?;
            }
            Command::Download(path) => {
                self.viewer.download_to(&path)?;
                writeln!(self.out, "downloaded to {}", path.display())?;
            }
            Command::Help => writeln!(self.out, "{HELP}")?,
            Command::Quit => {}
        }

        Ok(())
    }

    fn after_zoom(&mut self, changed: bool) -> Result<(), SessionError> {
        if changed {
            return self.show_frame();
        }
        let zoom = self.viewer.view().map(|view| view.zoom()).unwrap_or_default();
        writeln!(self.out, "zoom unchanged at {}", zoom_label(zoom))?;
        Ok(())
    }

    fn page(&self) -> u32 {
        self.viewer.current_page().unwrap_or_default()
    }

    /// Waits for the current page to render and prints a status line.
    fn show_frame(&mut self) -> Result<(), SessionError> {
        self.viewer.wait_idle(FRAME_TIMEOUT)?;

        let Some(view) = self.viewer.view().copied() else {
            return Ok(());
        };
        let size = match self.viewer.frame() {
            Some(frame) if self.viewer.frame_is_current() => {
                format!("{}x{}", frame.image.width(), frame.image.height())
            }
            _ => "not rendered".to_owned(),
        };

        writeln!(
            self.out,
            "page {} | zoom {} | rotation {} | {size}",
            self.viewer.page_indicator(),
            zoom_label(view.zoom()),
            view.rotation().degrees(),
        )?;
        Ok(())
    }

    fn show_info(&mut self) -> Result<(), SessionError> {
        let name = self.viewer.document_name().unwrap_or("-").to_owned();
        writeln!(self.out, "file: {name}")?;
        writeln!(self.out, "page: {}", self.viewer.page_indicator())?;

        let nav = self.viewer.nav_controls();
        writeln!(
            self.out,
            "previous: {} | next: {}",
            enabled(nav.previous_enabled),
            enabled(nav.next_enabled)
        )?;

        let entries: Vec<(String, String)> = self
            .viewer
            .metadata()
            .map(|metadata| {
                metadata
                    .entries()
                    .into_iter()
                    .map(|(label, value)| (label.to_owned(), value.to_owned()))
                    .collect()
            })
            .unwrap_or_default();
        for (label, value) in entries {
            writeln!(self.out, "{label}: {value}")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
enum SessionError {
    Viewer(ViewerError),
    Output(anyhow::Error),
}

impl From<ViewerError> for SessionError {
    fn from(err: ViewerError) -> Self {
        Self::Viewer(err)
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        Self::Output(err.into())
    }
}

fn zoom_label(zoom: f32) -> String {
    format!("{:.0}%", zoom * 100.0)
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}
