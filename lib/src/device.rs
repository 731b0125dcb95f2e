use candle_core::Device;
use std::{fmt, str::FromStr};

/// Which compute device to run on.
///
/// Selection never fails, an accelerator that isn't available (or that this
/// build wasn't compiled with support for) falls back to the CPU.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceSelector {
    /// The first CUDA device, then the first Metal device, then the CPU
    Auto,
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self::Auto
    }
}

impl DeviceSelector {
    pub fn select(self) -> Device {
        match self {
            Self::Auto => {
                if candle_core::utils::cuda_is_available() {
                    if let Ok(device) = Device::new_cuda(0) {
                        log::debug!("selected cuda:0");
                        return device;
                    }
                }

                if candle_core::utils::metal_is_available() {
                    if let Ok(device) = Device::new_metal(0) {
                        log::debug!("selected metal:0");
                        return device;
                    }
                }

                log::debug!("no accelerator available, selected cpu");
                Device::Cpu
            }
            Self::Cpu => Device::Cpu,
            Self::Cuda(ordinal) => Device::new_cuda(ordinal).unwrap_or_else(|err| {
                log::warn!("cuda:{} is unavailable ({}), falling back to cpu", ordinal, err);
                Device::Cpu
            }),
            Self::Metal(ordinal) => Device::new_metal(ordinal).unwrap_or_else(|err| {
                log::warn!("metal:{} is unavailable ({}), falling back to cpu", ordinal, err);
                Device::Cpu
            }),
        }
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
            Self::Metal(ordinal) => write!(f, "metal:{}", ordinal),
        }
    }
}

impl FromStr for DeviceSelector {
    type Err = String;

    /// Parses `auto`, `cpu`, `cuda`, `cuda:N`, `metal` or `metal:N`
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parts = input.splitn(2, ':');
        let kind = parts.next().unwrap_or("");

        let ordinal = match parts.next() {
            Some(num) => num
                .parse()
                .map_err(|_| format!("invalid device ordinal in `{}`", input))?,
            None => 0,
        };

        match kind {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda(ordinal)),
            "metal" => Ok(Self::Metal(ordinal)),
            other => Err(format!(
                "device `{}` not one of: 'auto', 'cpu', 'cuda[:N]', 'metal[:N]'",
                other
            )),
        }
    }
}

#[cfg(test)]
mod test {
    use super::DeviceSelector as DS;

    #[test]
    fn parses() {
        assert_eq!("auto".parse::<DS>(), Ok(DS::Auto));
        assert_eq!("cpu".parse::<DS>(), Ok(DS::Cpu));
        assert_eq!("cuda".parse::<DS>(), Ok(DS::Cuda(0)));
        assert_eq!("cuda:2".parse::<DS>(), Ok(DS::Cuda(2)));
        assert_eq!("metal:1".parse::<DS>(), Ok(DS::Metal(1)));
        assert!("tpu".parse::<DS>().is_err());
        assert!("cuda:x".parse::<DS>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for ds in [DS::Auto, DS::Cpu, DS::Cuda(3), DS::Metal(0)].iter() {
            assert_eq!(ds.to_string().parse::<DS>(), Ok(*ds));
        }
    }

    #[test]
    fn cpu_always_works() {
        assert!(DS::Cpu.select().is_cpu());
    }
}
