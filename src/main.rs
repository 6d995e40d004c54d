mod cli;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

#[cfg(any(feature = "tch-gpu", feature = "tch-cpu"))]
mod backend {
    use burn::backend::{libtorch::LibTorchDevice, Autodiff, LibTorch};

    pub type Backend = LibTorch<f32>;
    pub type TrainBackend = Autodiff<Backend>;

    #[cfg(feature = "tch-gpu")]
    pub fn device() -> LibTorchDevice {
        LibTorchDevice::Cuda(0)
    }

    #[cfg(not(feature = "tch-gpu"))]
    pub fn device() -> LibTorchDevice {
        LibTorchDevice::Cpu
    }
}

#[cfg(all(feature = "ndarray", not(any(feature = "tch-gpu", feature = "tch-cpu"))))]
mod backend {
    use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};

    pub type Backend = NdArray<f32>;
    pub type TrainBackend = Autodiff<Backend>;

    pub fn device() -> NdArrayDevice {
        NdArrayDevice::Cpu
    }
}

#[cfg(not(any(feature = "ndarray", feature = "tch-gpu", feature = "tch-cpu")))]
mod backend {
    use burn::backend::wgpu::{AutoGraphicsApi, Wgpu, WgpuDevice};
    use burn::backend::Autodiff;

    pub type Backend = Wgpu<AutoGraphicsApi, f32, i32>;
    pub type TrainBackend = Autodiff<Backend>;

    pub fn device() -> WgpuDevice {
        WgpuDevice::default()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ru_toxic=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    Cli::parse().run()
}
