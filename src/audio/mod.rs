//! # Audio Module
//!
//! Núcleo de reproducción por guild, sin dependencias directas de Discord.
//!
//! - [`queue`]: colas FIFO por guild
//! - [`track`]: descriptor de un elemento reproducible
//! - [`state`]: máquinas de estado de la conexión y del player
//! - [`transport`]: contratos del transporte de voz y del player
//! - [`subscription`]: una sesión de reproducción con su política de reconexión
//! - [`service`]: registro de sesiones y operaciones de los comandos

pub mod notice;
pub mod queue;
pub mod service;
pub mod state;
pub mod subscription;
pub mod track;
pub mod transport;

#[cfg(test)]
pub mod testing;
