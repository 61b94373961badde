//! Frame-by-frame animator simulation

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

use skel_anim::animator::ParameterType;
use skel_anim::{Animator, Entity, FrameContext};

use crate::document::RigDocument;
use crate::utils::{
    SectionTable, format_optional, format_percentage, format_seconds, format_vec3,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Path to the rig document (JSON)
    pub file: PathBuf,

    /// Number of frames to run
    #[arg(short = 'n', long, default_value_t = 60)]
    pub frames: u64,

    /// Seconds per frame
    #[arg(long, default_value_t = 1.0 / 60.0)]
    pub dt: f32,

    /// Set a parameter before the first frame (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub sets: Vec<(String, String)>,

    /// Fire a trigger before the given zero-based frame (repeatable)
    #[arg(long = "trigger", value_name = "NAME@FRAME", value_parser = parse_trigger)]
    pub triggers: Vec<(String, u64)>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

/// What one frame left behind
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    pub frame: u64,
    pub time: f32,
    pub state: String,
    pub state_time: f32,
    pub transition_to: Option<String>,
    pub transition_progress: Option<f32>,
    pub position: [f32; 3],
    pub events: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SimulationReport<'a> {
    rig: &'a str,
    dt: f32,
    frames: &'a [FrameRecord],
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() && !value.is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

fn parse_trigger(raw: &str) -> Result<(String, u64), String> {
    let (name, frame) = raw
        .rsplit_once('@')
        .ok_or_else(|| format!("expected NAME@FRAME, got '{raw}'"))?;
    if name.is_empty() {
        return Err(format!("missing trigger name in '{raw}'"));
    }
    let frame = frame
        .parse::<u64>()
        .map_err(|e| format!("invalid frame in '{raw}': {e}"))?;
    Ok((name.to_string(), frame))
}

/// Set `name` from its textual value, parsed by the parameter's type
fn apply_assignment(animator: &mut Animator, name: &str, raw: &str) -> Result<()> {
    let kind = animator
        .parameters()
        .get(name)
        .map(|parameter| parameter.kind())
        .with_context(|| format!("Unknown parameter '{name}'"))?;

    let accepted = match kind {
        ParameterType::Float => {
            let value = raw
                .parse::<f32>()
                .with_context(|| format!("'{raw}' is not a float"))?;
            animator.set_float(name, value)
        }
        ParameterType::Int => {
            let value = raw
                .parse::<i32>()
                .with_context(|| format!("'{raw}' is not an integer"))?;
            animator.set_int(name, value)
        }
        ParameterType::Bool => {
            let value = raw
                .parse::<bool>()
                .with_context(|| format!("'{raw}' is not true or false"))?;
            animator.set_bool(name, value)
        }
        ParameterType::Trigger => {
            let value = raw
                .parse::<bool>()
                .with_context(|| format!("'{raw}' is not true or false"))?;
            animator.set_trigger(name, value)
        }
    };
    if !accepted {
        bail!("Parameter '{name}' rejected value '{raw}'");
    }
    log::debug!("Set parameter {name} = {raw}");
    Ok(())
}

fn record_frame(animator: &mut Animator, frame: u64, time: f32, position: [f32; 3]) -> FrameRecord {
    let state_name = |index: Option<usize>| {
        index
            .and_then(|index| animator.states().get(index))
            .map(|state| state.name.clone())
    };
    let state = state_name(animator.current_state_index()).unwrap_or_default();
    let transition_to = state_name(animator.transition_target());
    let transition_progress = animator.transition_progress();
    let state_time = animator.state_time();
    let events = animator.drain_fired_events().map(|event| event.name).collect();

    FrameRecord {
        frame,
        time,
        state,
        state_time,
        transition_to,
        transition_progress,
        position,
        events,
    }
}

/// Run the rig for `args.frames` frames and collect one record per frame
pub fn simulate(doc: &RigDocument, args: &SimulateArgs) -> Result<Vec<FrameRecord>> {
    if !(args.dt.is_finite() && args.dt >= 0.0) {
        bail!("--dt must be a non-negative number of seconds");
    }
    let (mut scene, entity) = doc.build_scene()?;

    {
        let animator = scene
            .get_mut(entity)
            .and_then(Entity::animator_mut)
            .context("Rig entity has no animator")?;
        for (name, value) in &args.sets {
            apply_assignment(animator, name, value)?;
        }
        for (name, _) in &args.triggers {
            let is_trigger = animator
                .parameters()
                .get(name)
                .is_some_and(|parameter| parameter.kind() == ParameterType::Trigger);
            if !is_trigger {
                bail!("'{name}' is not a trigger parameter");
            }
        }
    }

    let mut records = Vec::with_capacity(usize::try_from(args.frames).unwrap_or(0));
    for frame in 0..args.frames {
        if let Some(animator) = scene.get_mut(entity).and_then(Entity::animator_mut) {
            for (name, _) in args.triggers.iter().filter(|(_, at)| *at == frame) {
                animator.set_trigger(name, true);
            }
        }

        scene.update(&FrameContext::new(args.dt).with_frame(frame));

        let node = scene.get_mut(entity).context("Rig entity disappeared")?;
        let position = node.transform.position.to_array();
        let animator = node.animator_mut().context("Rig entity has no animator")?;
        let time = (frame + 1) as f32 * args.dt;
        records.push(record_frame(animator, frame, time, position));
    }
    Ok(records)
}

fn print_table(records: &[FrameRecord]) {
    let mut table = SectionTable::new(&[
        "Frame",
        "Time",
        "State",
        "State time",
        "Transition",
        "Position",
        "Events",
    ]);
    for record in records {
        let transition = match (&record.transition_to, record.transition_progress) {
            (Some(target), Some(progress)) => format!("-> {target} {}", format_percentage(progress)),
            _ => "-".to_string(),
        };
        let events = (!record.events.is_empty()).then(|| record.events.join(", "));
        table.push([
            record.frame.to_string(),
            format_seconds(record.time),
            record.state.clone(),
            format_seconds(record.state_time),
            transition,
            format_vec3(glam::Vec3::from_array(record.position)),
            format_optional(events),
        ]);
    }
    table.print();
}

pub fn execute(args: SimulateArgs) -> Result<()> {
    let doc = RigDocument::load(&args.file)?;
    let records = simulate(&doc, &args)?;

    match args.format {
        OutputFormat::Table => {
            println!(
                "Simulated '{}' for {} frames at {}",
                doc.display_name(),
                records.len(),
                format_seconds(args.dt)
            );
            print_table(&records);
        }
        OutputFormat::Json => {
            let report = SimulationReport {
                rig: doc.display_name(),
                dt: args.dt,
                frames: &records,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("Speed=1.5"),
            Ok(("Speed".to_string(), "1.5".to_string()))
        );
        assert!(parse_assignment("Speed").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn test_parse_trigger() {
        assert_eq!(parse_trigger("Jump@12"), Ok(("Jump".to_string(), 12)));
        assert!(parse_trigger("Jump").is_err());
        assert!(parse_trigger("Jump@soon").is_err());
    }

    #[test]
    fn test_apply_assignment_parses_by_type() {
        use skel_anim::{AnimatorParameter, ParameterValue};

        let mut animator = Animator::new();
        animator.set_parameters(vec![
            AnimatorParameter::float("Speed", 0.0),
            AnimatorParameter::int("Stance", 0),
            AnimatorParameter::bool("Grounded", false),
        ]);

        apply_assignment(&mut animator, "Speed", "2.5").expect("float");
        apply_assignment(&mut animator, "Stance", "3").expect("int");
        apply_assignment(&mut animator, "Grounded", "true").expect("bool");
        assert!(apply_assignment(&mut animator, "Stance", "high").is_err());
        assert!(apply_assignment(&mut animator, "Missing", "1").is_err());

        assert_eq!(animator.parameters().value("Speed"), Some(ParameterValue::Float(2.5)));
        assert_eq!(animator.parameters().value("Stance"), Some(ParameterValue::Int(3)));
        assert_eq!(animator.parameters().value("Grounded"), Some(ParameterValue::Bool(true)));
    }
}
