// Line-oriented control commands, read from stdin by the driver.

use thiserror::Error;
use veil_conceal::ConcealStatus;
use veil_core::{CaptureExclusion, EmbeddingHost, HeightSpec, PanelConfig, PanelId, Size};
use veil_motion::PageDirection;

use crate::compositor::Compositor;
use crate::settings::SCROLL_SPEED_PRESETS;

pub const HELP: &str = "commands: scroll <delta> | up | down | top | bottom | page next|prev | \
add <id> <source> [height] | remove <id> | reorder <id>... | show <id> | hide <id> | \
resize <w> <h> | speed slow|normal|fast|<px> | conceal on|off|toggle | status | reload | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Scroll(f32),
    Up,
    Down,
    Top,
    Bottom,
    Page(PageDirection),
    Add {
        id: String,
        source: String,
        height: HeightSpec,
    },
    Remove(String),
    Reorder(Vec<String>),
    Show(String),
    Hide(String),
    Resize(Size),
    Speed(f32),
    Conceal(ConcealAction),
    Status,
    Reload,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcealAction {
    On,
    Off,
    Toggle,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?} (try `help`)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("not a number: {0:?}")]
    Number(String),

    #[error("not a height: {0:?}")]
    Height(String),
}

fn number(text: &str) -> Result<f32, ParseError> {
    text.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::Number(text.to_string()))
}

pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut words = line.split_whitespace();
    let head = words.next().ok_or(ParseError::Empty)?;
    let args: Vec<&str> = words.collect();

    let command = match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("scroll", [delta]) => Command::Scroll(number(delta)?),
        ("scroll", _) => return Err(ParseError::Usage("scroll <delta>")),
        ("up", []) => Command::Up,
        ("down", []) => Command::Down,
        ("top", []) => Command::Top,
        ("bottom", []) => Command::Bottom,
        ("page", ["next"]) => Command::Page(PageDirection::Next),
        ("page", ["prev"]) => Command::Page(PageDirection::Prev),
        ("page", _) => return Err(ParseError::Usage("page next|prev")),
        ("add", [id, source]) => Command::Add {
            id: id.to_string(),
            source: source.to_string(),
            height: HeightSpec::Default,
        },
        ("add", [id, source, height]) => Command::Add {
            id: id.to_string(),
            source: source.to_string(),
            height: HeightSpec::parse(height)
                .ok_or_else(|| ParseError::Height(height.to_string()))?,
        },
        ("add", _) => return Err(ParseError::Usage("add <id> <source> [height]")),
        ("remove", [id]) => Command::Remove(id.to_string()),
        ("remove", _) => return Err(ParseError::Usage("remove <id>")),
        ("reorder", ids) if !ids.is_empty() => {
            Command::Reorder(ids.iter().map(|s| s.to_string()).collect())
        }
        ("reorder", _) => return Err(ParseError::Usage("reorder <id>...")),
        ("show", [id]) => Command::Show(id.to_string()),
        ("hide", [id]) => Command::Hide(id.to_string()),
        ("show", _) | ("hide", _) => return Err(ParseError::Usage("show|hide <id>")),
        ("resize", [w, h]) => Command::Resize(Size::new(number(w)?, number(h)?)),
        ("resize", _) => return Err(ParseError::Usage("resize <w> <h>")),
        ("speed", ["slow"]) => Command::Speed(SCROLL_SPEED_PRESETS[0]),
        ("speed", ["normal"]) => Command::Speed(SCROLL_SPEED_PRESETS[1]),
        ("speed", ["fast"]) => Command::Speed(SCROLL_SPEED_PRESETS[2]),
        ("speed", [px]) => Command::Speed(number(px)?),
        ("speed", _) => return Err(ParseError::Usage("speed slow|normal|fast|<px>")),
        ("conceal", ["on"]) => Command::Conceal(ConcealAction::On),
        ("conceal", ["off"]) => Command::Conceal(ConcealAction::Off),
        ("conceal", ["toggle"]) | ("conceal", []) => Command::Conceal(ConcealAction::Toggle),
        ("conceal", _) => return Err(ParseError::Usage("conceal on|off|toggle")),
        ("status", []) => Command::Status,
        ("reload", []) => Command::Reload,
        ("help", _) | ("?", _) => Command::Help,
        ("quit", []) | ("exit", []) => Command::Quit,
        _ => return Err(ParseError::Unknown(line.trim().to_string())),
    };
    Ok(command)
}

fn describe(status: ConcealStatus) -> String {
    match status {
        ConcealStatus::Unavailable => "unavailable".to_string(),
        ConcealStatus::Inactive => "off".to_string(),
        ConcealStatus::Active(n) => format!("on ({} windows)", n),
    }
}

impl<H: EmbeddingHost, P: CaptureExclusion> Compositor<H, P> {
    /// Run one command and describe the outcome. `Quit` is the caller's job.
    pub fn execute(&mut self, command: Command) -> String {
        let moved = |started: bool| (if started { "ok" } else { "no change" }).to_string();

        match command {
            Command::Scroll(delta) => moved(self.scroll_by(delta)),
            Command::Up => moved(self.scroll_up()),
            Command::Down => moved(self.scroll_down()),
            Command::Top => moved(self.scroll_to_top()),
            Command::Bottom => moved(self.scroll_to_bottom()),
            Command::Page(direction) => moved(self.navigate_to_page(direction)),
            Command::Add { id, source, height } => {
                match self.add_panel(PanelConfig::new(id, source).with_height(height)) {
                    Ok(id) => format!("added {}", id),
                    Err(e) => format!("error: {}", e),
                }
            }
            Command::Remove(id) => match self.remove_panel(&PanelId::from(id)) {
                Ok(()) => "removed".to_string(),
                Err(e) => format!("error: {}", e),
            },
            Command::Reorder(ids) => {
                let ids: Vec<PanelId> = ids.into_iter().map(PanelId::from).collect();
                match self.reorder(&ids) {
                    Ok(()) => "reordered".to_string(),
                    Err(e) => format!("error: {}", e),
                }
            }
            Command::Show(id) => self.visibility_reply(id, true),
            Command::Hide(id) => self.visibility_reply(id, false),
            Command::Resize(size) => {
                self.resize(size);
                let v = self.viewport();
                format!("viewport {}x{}", v.width, v.height)
            }
            Command::Speed(px) => {
                if self.set_scroll_speed(px) {
                    format!("scroll speed {}", px)
                } else {
                    format!("error: invalid scroll speed {}", px)
                }
            }
            Command::Conceal(ConcealAction::On) => match self.conceal_enable() {
                Ok(outcome) if outcome.all_succeeded() => {
                    format!("concealment {}", describe(self.conceal_status()))
                }
                Ok(outcome) => format!(
                    "concealment {}; failed: {}",
                    describe(self.conceal_status()),
                    outcome
                        .failed
                        .iter()
                        .map(|(title, e)| format!("{} ({})", title, e))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                Err(e) => format!("error: {}", e),
            },
            Command::Conceal(ConcealAction::Off) => {
                let outcome = self.conceal_disable();
                if outcome.all_succeeded() {
                    format!("concealment {}", describe(self.conceal_status()))
                } else {
                    format!(
                        "concealment {}; {} windows could not be revealed",
                        describe(self.conceal_status()),
                        outcome.failed.len()
                    )
                }
            }
            Command::Conceal(ConcealAction::Toggle) => {
                format!("concealment {}", describe(self.conceal_toggle()))
            }
            Command::Status => self.status_line(),
            Command::Reload => {
                self.reload();
                self.status_line()
            }
            Command::Help => HELP.to_string(),
            Command::Quit => "bye".to_string(),
        }
    }

    fn visibility_reply(&mut self, id: String, visible: bool) -> String {
        match self.set_visibility(&PanelId::from(id), visible) {
            Ok(true) => (if visible { "shown" } else { "hidden" }).to_string(),
            Ok(false) => "no change".to_string(),
            Err(e) => format!("error: {}", e),
        }
    }

    pub fn status_line(&self) -> String {
        let state = self.scroll_state();
        let ids: Vec<String> = self
            .registry()
            .configs()
            .map(|c| {
                if c.visible {
                    c.id.to_string()
                } else {
                    format!("({})", c.id)
                }
            })
            .collect();
        format!(
            "panels [{}] | offset {:.0} of {:.0}{} | step {} | concealment {}",
            ids.join(" "),
            state.offset,
            -self.plan().max_scroll,
            if state.animating { " (moving)" } else { "" },
            self.settings().scroll_step(),
            describe(self.conceal_status())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scroll_and_paging() {
        assert_eq!(parse("scroll -250"), Ok(Command::Scroll(-250.0)));
        assert_eq!(parse("  DOWN "), Ok(Command::Down));
        assert_eq!(parse("page next"), Ok(Command::Page(PageDirection::Next)));
        assert_eq!(parse("page prev"), Ok(Command::Page(PageDirection::Prev)));
        assert_eq!(parse("page sideways"), Err(ParseError::Usage("page next|prev")));
    }

    #[test]
    fn parses_panel_commands() {
        assert_eq!(
            parse("add notes https://n.example 40%"),
            Ok(Command::Add {
                id: "notes".to_string(),
                source: "https://n.example".to_string(),
                height: HeightSpec::Percent(40.0),
            })
        );
        assert_eq!(
            parse("add notes https://n.example tall"),
            Err(ParseError::Height("tall".to_string()))
        );
        assert_eq!(
            parse("reorder c a b"),
            Ok(Command::Reorder(vec![
                "c".to_string(),
                "a".to_string(),
                "b".to_string()
            ]))
        );
        assert_eq!(parse("hide a"), Ok(Command::Hide("a".to_string())));
    }

    #[test]
    fn parses_misc() {
        assert_eq!(
            parse("resize 400 900"),
            Ok(Command::Resize(Size::new(400.0, 900.0)))
        );
        assert_eq!(parse("conceal"), Ok(Command::Conceal(ConcealAction::Toggle)));
        assert_eq!(parse("conceal off"), Ok(Command::Conceal(ConcealAction::Off)));
        assert_eq!(parse("speed 50"), Ok(Command::Speed(50.0)));
        assert_eq!(parse("speed fast"), Ok(Command::Speed(200.0)));
        assert_eq!(parse("quit"), Ok(Command::Quit));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse("   "), Err(ParseError::Empty));
        assert_eq!(parse("scroll lots"), Err(ParseError::Number("lots".to_string())));
        assert_eq!(parse("scroll NaN"), Err(ParseError::Number("NaN".to_string())));
        assert!(matches!(parse("dance"), Err(ParseError::Unknown(_))));
        assert!(matches!(parse("reorder"), Err(ParseError::Usage(_))));
    }
}
