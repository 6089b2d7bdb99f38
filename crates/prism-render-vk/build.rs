// SPDX-License-Identifier: CEPL-1.0
use std::{env, fs, path::PathBuf};

// Vertex layout expected by the pipeline:
//   binding 0, location 0: R32G32B32_SFLOAT position
//   binding 0, location 1: R32G32B32_SFLOAT color
const SHADERS: [(&str, shaderc::ShaderKind); 2] = [
    ("forward.vert", shaderc::ShaderKind::Vertex),
    ("color.frag", shaderc::ShaderKind::Fragment),
];

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());
    let src_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap()).join("shaders");

    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_3 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    for (name, kind) in SHADERS {
        let path = src_dir.join(name);
        println!("cargo:rerun-if-changed={}", path.display());
        let source = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("reading {}: {e}", path.display()));
        let spv = comp
            .compile_into_spirv(&source, kind, name, "main", Some(&opts))
            .unwrap_or_else(|e| panic!("compiling {name}: {e}"));
        fs::write(out.join(format!("{name}.spv")), spv.as_binary_u8()).unwrap();
    }

    println!("cargo:rerun-if-changed=build.rs");
}
