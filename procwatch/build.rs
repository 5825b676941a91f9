use aya_build::cargo_metadata;
use derive_more::{Display, From};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Display, From)]
#[display("{self:?}")]
pub enum Error {
	#[from(String, &String, &str)]
	Custom(String),
	MetadataFail,
	BuildFail,
}

const EBPF_PACKAGE: &str = "procwatch-ebpf";

fn main() -> Result<()> {
	let cargo_metadata::Metadata { packages, .. } = cargo_metadata::MetadataCommand::new()
		.no_deps()
		.exec()
		.map_err(|_| Error::MetadataFail)?;
	let ebpf_package = packages
		.into_iter()
		.find(|cargo_metadata::Package { name, .. }| name == EBPF_PACKAGE)
		.ok_or_else(|| Error::Custom(format!("{EBPF_PACKAGE} package not found")))?;
	aya_build::build_ebpf([ebpf_package]).map_err(|_| Error::BuildFail)?;
	Ok(())
}
