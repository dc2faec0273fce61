//! Line commands for driving a coordinator interactively

use anyhow::{anyhow, bail, Context, Result};
use std::io::Write;

use xr_anchors_core::{
    AnchorCoordinator, AnchorHost, ContentPlacer, IdentifierStore, PersistOutcome, Point3D, Pose,
};

pub const HELP: &str = "\
Commands:
  create [--persist] <x> <y> <z>   create an anchor, optionally saving it
  reload                           load and bind every persisted anchor
  erase                            erase persisted anchors from host storage
  teardown                         remove every anchor from the scene
  list                             show active anchors and persisted ids
  arm                              place content on the next reference anchor
  help                             show this message
  quit                             exit";

/// A parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create { position: Point3D, persist: bool },
    Reload,
    Erase,
    Teardown,
    List,
    Arm,
    Help,
    Quit,
}

impl Command {
    /// Parse one line. Blank lines parse to `None`.
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match verb.to_ascii_lowercase().as_str() {
            "create" => parse_create(&rest)?,
            "reload" => Command::Reload,
            "erase" => Command::Erase,
            "teardown" => Command::Teardown,
            "list" | "ls" => Command::List,
            "arm" => Command::Arm,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => bail!("Unknown command '{}' (try 'help')", other),
        };

        if !matches!(command, Command::Create { .. }) && !rest.is_empty() {
            bail!("'{}' takes no arguments", verb);
        }
        Ok(Some(command))
    }
}

fn parse_create(args: &[&str]) -> Result<Command> {
    let persist = args.contains(&"--persist");
    let coords: Vec<f32> = args
        .iter()
        .filter(|arg| **arg != "--persist")
        .map(|arg| {
            arg.parse::<f32>()
                .with_context(|| format!("Invalid coordinate '{}'", arg))
        })
        .collect::<Result<_>>()?;

    match coords.as_slice() {
        [x, y, z] => Ok(Command::Create {
            position: Point3D::new(*x, *y, *z),
            persist,
        }),
        _ => Err(anyhow!("usage: create [--persist] <x> <y> <z>")),
    }
}

/// Coordinator plus the content placer fed by its localized anchors.
pub struct Session<H: AnchorHost, S: IdentifierStore> {
    coordinator: AnchorCoordinator<H, S>,
    placer: ContentPlacer,
}

impl<H: AnchorHost, S: IdentifierStore> Session<H, S> {
    pub fn new(coordinator: AnchorCoordinator<H, S>, placer: ContentPlacer) -> Self {
        Self {
            coordinator,
            placer,
        }
    }

    pub fn coordinator(&self) -> &AnchorCoordinator<H, S> {
        &self.coordinator
    }

    pub fn placer(&self) -> &ContentPlacer {
        &self.placer
    }

    /// Run one command. Returns false once the session should end.
    ///
    /// Anchor operation failures are reported to `out`; only write errors
    /// are returned.
    pub async fn execute(&mut self, command: Command, out: &mut impl Write) -> Result<bool> {
        match command {
            Command::Create { position, persist } => {
                match self
                    .coordinator
                    .create_anchor(Pose::from_position(position), persist)
                    .await
                {
                    Ok(created) => {
                        let note = match &created.persistence {
                            PersistOutcome::NotRequested => "not persisted".to_string(),
                            PersistOutcome::Persisted => "persisted".to_string(),
                            PersistOutcome::Failed(e) => format!("NOT persisted: {}", e),
                        };
                        writeln!(
                            out,
                            "created {} at {} ({})",
                            created.id(),
                            created.record.pose.position,
                            note
                        )?;
                        self.observe(created.record.pose.position, out)?;
                    }
                    Err(e) => writeln!(out, "create failed: {}", e)?,
                }
            }
            Command::Reload => match self.coordinator.reload_persisted_anchors().await {
                Ok(report) => {
                    writeln!(
                        out,
                        "reloaded {} of {} anchor(s)",
                        report.loaded.len(),
                        report.requested
                    )?;
                    for failure in &report.failures {
                        writeln!(out, "  {} failed: {}", failure.id, failure.error)?;
                    }
                    for id in &report.missing {
                        writeln!(out, "  {} not found in host storage", id)?;
                    }
                    for record in &report.loaded {
                        self.observe(record.pose.position, out)?;
                    }
                }
                Err(e) => writeln!(out, "reload failed: {}", e)?,
            },
            Command::Erase => match self.coordinator.erase_all_persisted().await {
                Ok(report) => writeln!(
                    out,
                    "erased {} anchor(s), cleared {} identifier(s)",
                    report.erased_handles + report.erased_ids,
                    report.cleared_ids
                )?,
                Err(e) => writeln!(out, "erase failed: {}", e)?,
            },
            Command::Teardown => {
                let removed = self.coordinator.teardown_active_anchors().await;
                writeln!(out, "removed {} anchor(s) from the scene", removed)?;
            }
            Command::List => {
                let active = self.coordinator.active_anchors().await;
                writeln!(out, "{} active anchor(s)", active.len())?;
                for record in &active {
                    writeln!(
                        out,
                        "  {} {} at {}{}",
                        record.id,
                        record.state,
                        record.pose.position,
                        if record.persisted { " [saved]" } else { "" }
                    )?;
                }
                let persisted = self.coordinator.persisted_ids().await;
                writeln!(out, "{} persisted identifier(s)", persisted.len())?;
                for id in &persisted {
                    writeln!(out, "  {}", id)?;
                }
                for pose in self.placer.placements() {
                    writeln!(out, "content placed at {}", pose.position)?;
                }
            }
            Command::Arm => {
                self.placer.arm();
                writeln!(out, "armed; waiting for a reference anchor")?;
            }
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn observe(&mut self, position: Point3D, out: &mut impl Write) -> Result<()> {
        if !self.placer.observe(position) {
            return Ok(());
        }
        if let Some(pose) = self.placer.try_place() {
            writeln!(out, "content placed at {}", pose.position)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use xr_anchors_core::{CoordinatorConfig, MemoryIdentifierStore};
    use xr_anchors_sim::{SimConfig, SimulatedHost};

    fn session() -> Session<SimulatedHost, MemoryIdentifierStore> {
        let host = Arc::new(SimulatedHost::new(SimConfig {
            polls_to_localize: Some(1),
            latency: Duration::ZERO,
        }));
        let coordinator = AnchorCoordinator::new(
            host,
            Arc::new(MemoryIdentifierStore::new()),
            CoordinatorConfig::default().with_poll_interval(Duration::from_millis(1)),
        )
        .unwrap();
        let placer = ContentPlacer::new(
            Point3D::new(1.0, 0.0, 0.0),
            Pose::from_position(Point3D::new(1.0, 0.0, 0.0)),
        );
        Session::new(coordinator, placer)
    }

    #[test]
    fn test_parse_create() {
        assert_eq!(
            Command::parse("create --persist 1 2.5 -3").unwrap(),
            Some(Command::Create {
                position: Point3D::new(1.0, 2.5, -3.0),
                persist: true,
            })
        );
        assert_eq!(
            Command::parse("  CREATE 0 0 0 ").unwrap(),
            Some(Command::Create {
                position: Point3D::new(0.0, 0.0, 0.0),
                persist: false,
            })
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse("create 1 2").is_err());
        assert!(Command::parse("create 1 two 3").is_err());
        assert!(Command::parse("reload now").is_err());
        assert!(Command::parse("jump").is_err());
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let mut session = session();
        let mut out = Vec::new();

        let cmd = Command::parse("create --persist 0 1 2").unwrap().unwrap();
        assert!(session.execute(cmd, &mut out).await.unwrap());
        assert!(session.execute(Command::List, &mut out).await.unwrap());

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("(persisted)"));
        assert!(text.contains("1 active anchor(s)"));
        assert!(text.contains("1 persisted identifier(s)"));
    }

    #[tokio::test]
    async fn test_armed_placer_uses_next_anchor() {
        let mut session = session();
        let mut out = Vec::new();

        session.execute(Command::Arm, &mut out).await.unwrap();
        let cmd = Command::parse("create 3 0 1").unwrap().unwrap();
        session.execute(cmd, &mut out).await.unwrap();

        assert_eq!(
            session.placer().placements(),
            &[Pose::from_position(Point3D::new(3.0, 0.0, 1.0))]
        );
        assert!(!session.placer().is_armed());
    }

    #[tokio::test]
    async fn test_arm_ignores_anchors_removed_before_arming() {
        let mut session = session();
        let mut out = Vec::new();

        for x in 0..5 {
            let line = format!("create {} 0 0", x);
            let cmd = Command::parse(&line).unwrap().unwrap();
            session.execute(cmd, &mut out).await.unwrap();
        }
        session.execute(Command::Teardown, &mut out).await.unwrap();
        assert_eq!(session.placer().pending_references(), 0);

        session.execute(Command::Arm, &mut out).await.unwrap();
        let cmd = Command::parse("create 50 0 0").unwrap().unwrap();
        session.execute(cmd, &mut out).await.unwrap();

        assert_eq!(
            session.placer().placements(),
            &[Pose::from_position(Point3D::new(50.0, 0.0, 0.0))]
        );
    }

    #[tokio::test]
    async fn test_quit_ends_session() {
        let mut session = session();
        let mut out = Vec::new();
        assert!(!session.execute(Command::Quit, &mut out).await.unwrap());
    }
}
