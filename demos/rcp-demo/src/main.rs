use std::time::Duration;

use rcp::prelude::*;
use rcp::rcp_protocol::{DefaultDefinition, EnumDefinition};
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 10000;
const TICK: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Exposed controls
// ---------------------------------------------------------------------------

/// Handles of an oscillator exposed to clients.
struct Oscillator {
    running: ParameterId,
    frequency: ParameterId,
    waveform: ParameterId,
    tint: ParameterId,
    phase: ParameterId,
}

fn expose_oscillator(server: &mut ParameterServer) -> Result<Oscillator, RcpError> {
    let group = server.create_group(None)?;
    server.parameter_mut(group)?.set_label("oscillator");

    let running = server.create_parameter(
        TypeDefinition::Boolean(DefaultDefinition::default()),
        Some(group),
    )?;
    {
        let mut parameter = server.parameter_mut(running)?;
        parameter.set_label("running");
        parameter.set_value(true)?;
    }

    let mut definition = TypeDefinition::number::<f32>();
    if let Some(number) = definition.as_number_mut::<f32>() {
        number.set_minimum(0.1);
        number.set_maximum(20.0);
        number.set_unit("Hz");
    }
    let frequency = server.create_parameter(definition, Some(group))?;
    {
        let mut parameter = server.parameter_mut(frequency)?;
        parameter.set_label("frequency");
        parameter.set_language_label("deu", "Frequenz");
        parameter.set_value(1.0f32)?;
    }

    let mut shapes = EnumDefinition::default();
    shapes.set_entries(["sine", "square", "saw"]);
    shapes.set_default("sine");
    let waveform = server.create_parameter(TypeDefinition::Enum(shapes), Some(group))?;
    {
        let mut parameter = server.parameter_mut(waveform)?;
        parameter.set_label("waveform");
        parameter.set_value("sine")?;
    }

    let tint = server.create_parameter(
        TypeDefinition::Rgba(DefaultDefinition::default()),
        Some(group),
    )?;
    {
        let mut parameter = server.parameter_mut(tint)?;
        parameter.set_label("tint");
        parameter.set_value(Color::rgba(255, 128, 0, 255))?;
    }

    let mut definition = TypeDefinition::number::<f32>();
    if let Some(number) = definition.as_number_mut::<f32>() {
        number.set_minimum(0.0);
        number.set_maximum(1.0);
    }
    let phase = server.create_parameter(definition, Some(group))?;
    {
        let mut parameter = server.parameter_mut(phase)?;
        parameter.set_label("phase");
        parameter.set_description("read only, advanced by the server");
        parameter.set_value(0.0f32)?;
    }

    Ok(Oscillator {
        running,
        frequency,
        waveform,
        tint,
        phase,
    })
}

/// Advances the phase by one tick. Returns the new phase when running.
fn advance(server: &mut ParameterServer, oscillator: &Oscillator) -> Result<Option<f32>, RcpError> {
    let running = server
        .get(oscillator.running)
        .and_then(Parameter::value)
        .is_some_and(|value| *value == Value::Boolean(true));
    if !running {
        return Ok(None);
    }
    let frequency = match server.get(oscillator.frequency).and_then(Parameter::value) {
        Some(Value::Float32(frequency)) => *frequency,
        _ => 1.0,
    };
    let phase = match server.get(oscillator.phase).and_then(Parameter::value) {
        Some(Value::Float32(phase)) => *phase,
        _ => 0.0,
    };
    let next = (phase + frequency * TICK.as_secs_f32()).fract();
    server.parameter_mut(oscillator.phase)?.set_value(next)?;
    Ok(Some(next))
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => DEFAULT_PORT,
    };

    let mut transporter = WebSocketServerTransporter::from_current()?;
    transporter.bind(port)?;
    let mut server = ParameterServer::builder()
        .application_id("rcp-demo")
        .transporter(transporter)
        .build();
    let oscillator = expose_oscillator(&mut server)?;
    tracing::info!(port, "parameter server running, ctrl-c to stop");
    println!("{}", serde_json::to_string_pretty(&server.hierarchy())?);

    let mut tick = tokio::time::interval(TICK);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = &mut shutdown => break,
        }
        server.poll();
        advance(&mut server, &oscillator)?;
        server.update();
    }

    tracing::info!(connections = server.connection_count(), "shutting down");
    Ok(())
}
