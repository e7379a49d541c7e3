#![doc = "MeshLink Harness\n\nIn-process stand-ins for the external contracts a MeshLink session depends on: an in-memory mesh transport and a scripted microphone. Used by tests and the demo program."]

pub mod mesh;
pub mod microphone;

pub use mesh::LocalMesh;
pub use microphone::ScriptedMicrophone;
