use std::{env, fs, path::PathBuf, process::Command};

use derive_more::{Display, From};
use which::which;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Display, From)]
#[display("{self:?}")]
pub enum Error {
	#[from]
	Which(which::Error),
	#[from]
	Var(env::VarError),
	#[from]
	Io(std::io::Error),
	BindgenFail {
		status: String,
		stderr: String,
	},
}

/// Generates `task_struct` bindings for the running kernel from its BTF.
fn main() -> Result<()> {
	let bpf_linker = which("bpf-linker")?;
	println!("cargo:rerun-if-changed={}", bpf_linker.display());
	println!("cargo:rerun-if-changed=/sys/kernel/btf/vmlinux");

	let aya_tool = which("aya-tool")?;
	let output = Command::new(aya_tool).args(["generate", "task_struct"]).output()?;
	if !output.status.success() {
		return Err(Error::BindgenFail {
			status: output.status.to_string(),
			stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
		});
	}

	let out_dir = PathBuf::from(env::var("OUT_DIR")?);
	fs::write(out_dir.join("vmlinux.rs"), output.stdout)?;

	Ok(())
}
