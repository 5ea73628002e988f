//! Shell procedure run as the sandbox entrypoint.

use crate::models::WorkspaceSpec;
use std::sync::OnceLock;
use tera::{Context as TeraContext, Tera};

/// Port the notebook server binds inside the sandbox.
pub const NOTEBOOK_PORT: u16 = 8000;
/// Mount point of the notebooks volume.
pub const DATA_MOUNT: &str = "/data";
/// Mount point of the dependency cache volume.
pub const CACHE_MOUNT: &str = "/cache";

static STARTUP_TERA: OnceLock<Tera> = OnceLock::new();

fn startup_tera() -> &'static Tera {
    STARTUP_TERA.get_or_init(|| {
        let mut tera = Tera::default();
        tera.add_raw_template("startup.sh", include_str!("startup.sh.j2"))
            .expect("Failed to add startup script template");
        tera
    })
}

/// Wrap in single quotes unless the value is made of shell-safe characters only.
pub(crate) fn shell_escape(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\"'\"'"))
    }
}

/// Render the procedure that prepares the workspace directory, seeds a
/// notebook when none exists, installs requirements, and starts the server.
pub fn render_startup_script(spec: &WorkspaceSpec) -> Result<String, tera::Error> {
    let workspace_dir = format!("{}/{}", DATA_MOUNT, spec.workspace_id());
    let requirements = spec
        .requirements()
        .iter()
        .map(|r| shell_escape(r))
        .collect::<Vec<_>>()
        .join(" ");

    let mut context = TeraContext::new();
    context.insert("workspace_dir", &shell_escape(&workspace_dir));
    context.insert("entrypoint", &shell_escape(spec.entrypoint_filename()));
    context.insert("requirements", &requirements);
    context.insert("cache_dir", CACHE_MOUNT);
    context.insert("port", &NOTEBOOK_PORT);
    context.insert("token", &shell_escape(spec.token()));

    let script = startup_tera().render("startup.sh", &context)?;
    Ok(script.trim_end().to_string())
}
