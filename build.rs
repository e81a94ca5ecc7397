use std::env;
use std::path::PathBuf;

fn main() {
	let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
	let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

	let config = cbindgen::Config {
		language: cbindgen::Language::C,
		..Default::default()
	};

	match cbindgen::Builder::new()
		.with_crate(&crate_dir)
		.with_config(config)
		.generate()
	{
		Ok(bindings) => {
			bindings.write_to_file(out_dir.join("schema_object.h"));
		}
		// A header is a nice-to-have for C consumers, not required for the Rust build itself -
		// never fail the build over it.
		Err(err) => println!("cargo:warning=cbindgen failed to generate a header: {err}"),
	}

	println!("cargo:rerun-if-changed=src");
}
