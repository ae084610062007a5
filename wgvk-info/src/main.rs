//! 打印本机 Vulkan adapter 在兼容层视角下的能力

use anyhow::Context;
use clap::Parser;
use wgvk_crate_tools::config::GfxConfig;
use wgvk_crate_tools::init_log::init_log_with_level;
use wgvk_gfx::device::DeviceDescriptor;
use wgvk_gfx::instance::RequestAdapterOptions;
use wgvk_gfx::types::PowerPreference;
use wgvk_gfx::{Adapter, Instance, hal::vulkan::Vulkan};

#[derive(Parser, Debug)]
#[command(name = "wgvk-info")]
#[command(about = "List adapters and print what the compatibility layer exposes")]
struct Args {
    /// 偏好集成显卡
    #[arg(long, conflicts_with = "high_performance")]
    low_power: bool,

    /// 偏好独立显卡
    #[arg(long)]
    high_performance: bool,

    /// 用全部支持的 feature 创建一次 device
    #[arg(long)]
    device: bool,
}

impl Args {
    fn power_preference(&self) -> PowerPreference {
        if self.low_power {
            PowerPreference::LowPower
        } else if self.high_performance {
            PowerPreference::HighPerformance
        } else {
            PowerPreference::Undefined
        }
    }
}

fn print_adapter(adapter: &Adapter<Vulkan>) {
    let info = adapter.info();
    println!("adapter: {}", info.device);
    println!("  vendor:       {} (0x{:04x})", info.vendor, info.vendor_id);
    println!("  device id:    0x{:04x}", info.device_id);
    println!("  type:         {:?}", info.adapter_type);
    println!("  backend:      {:?}", info.backend_type);
    println!("  description:  {}", info.description);
    println!("  subgroup:     {}..={}", info.subgroup_min_size, info.subgroup_max_size);

    println!("limits:");
    println!("{:#?}", adapter.limits());

    println!("features:");
    for feature in adapter.features() {
        println!("  {:?}", feature);
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = GfxConfig::from_env().context("加载 wgvk 配置失败")?;
    init_log_with_level(config.log_level_filter());

    let instance = Instance::new(&config).context("创建 instance 失败")?;
    let adapters = instance.enumerate_adapters().context("枚举 adapter 失败")?;
    log::info!("found {} adapter(s)", adapters.len());

    let options = RequestAdapterOptions {
        power_preference: args.power_preference(),
        ..Default::default()
    };
    let adapter = instance.select_adapter(&options).context("没有可用的 adapter")?;
    print_adapter(&adapter);

    if args.device {
        let descriptor = DeviceDescriptor {
            label: "wgvk-info".to_string(),
            required_features: adapter.features(),
            ..Default::default()
        };
        let device = adapter.create_device(descriptor).context("创建 device 失败")?;
        println!("device: created with {} feature(s)", device.features().len());
        device.destroy();
    }

    Ok(())
}
