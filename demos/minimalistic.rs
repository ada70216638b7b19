extern crate openlcb_node;

use std::cell::RefCell;

use embedded_storage_inmemory::MemFlash;
use openlcb_core::error::ErrorCode;
use openlcb_core::identity::NodeIdentity;
use openlcb_core::ids::NodeId;
use openlcb_node::OpenlcbNode;
use openlcb_persistence::node_config::{NodeConfig, PersistentNodeConfigStorage};
use openlcb_persistence::{PersistentStorage, Storage};
use openlcb_svc_all::Services;
use openlcb_svc_memconfig::HostCallbacks;
use rclite::Rc;

#[derive(Clone)]
struct MyIdentity;

impl NodeIdentity for MyIdentity {
    fn snip(&self) -> &[u8] {
        b"\x04My Company\x00My Little Test Module\x00A\x001.0\x00\x01\x00\x00"
    }

    fn acdi_manufacturer(&self) -> &[u8] {
        b"\x04My Company\x00My Little Test Module\x00A\x001.0\x00"
    }

    fn cdi(&self) -> &[u8] {
        b"<cdi/>"
    }
}

const EVENT_VARS: usize = 4;

struct MyHost {
    config: PersistentNodeConfigStorage<MemFlash<128, 1, 1>, 0, EVENT_VARS, 63, 64>,
}

impl HostCallbacks for MyHost {
    fn config_memory_highest_address(&self, _node_id: NodeId) -> u32 {
        127
    }

    fn config_memory_read(&mut self, _node_id: NodeId, address: u32, out: &mut [u8]) -> Result<(), ErrorCode> {
        let _ = (address, out);
        Ok(())
    }

    fn config_memory_write(&mut self, _node_id: NodeId, address: u32, data: &[u8]) -> Result<(), ErrorCode> {
        let _ = (address, data);
        Ok(())
    }

    fn acdi_user_highest_address(&self, _node_id: NodeId) -> u32 {
        63
    }

    fn acdi_user_read(&mut self, _node_id: NodeId, address: u32, out: &mut [u8]) -> Result<(), ErrorCode> {
        let name = self.config.user_name();
        let start = address as usize;
        let end = start + out.len();
        if end <= name.len() {
            out.copy_from_slice(&name[start..end]);
        } else {
            let desc = self.config.user_description();
            let desc_start = start.saturating_sub(name.len());
            out.copy_from_slice(&desc[desc_start..desc_start + out.len()]);
        }
        Ok(())
    }

    fn acdi_user_write(&mut self, _node_id: NodeId, _address: u32, _data: &[u8]) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn reboot(&mut self, _node_id: NodeId) {}

    fn configuration_memory_factory_reset(&mut self, _node_id: NodeId) {
        self.config.wipe();
    }
}

fn main() -> ! {
    // A real module would back this with its MCU's EEPROM or flash driver
    // instead of an in-RAM stand-in.
    let storage_driver = Rc::new(RefCell::new(MemFlash::<128, 1, 1>::new(0xff)));
    let mut config = PersistentNodeConfigStorage::<_, 0, EVENT_VARS, 63, 64>::new(storage_driver);
    config.load();

    let services = Services::new(MyIdentity, MyHost { config });

    // `device` is whatever `embedded_can::nb::Can` driver the board
    // support crate exposes, wrapped in `openlcb_network::phy::can::EmbeddedCan`.
    let mut node: OpenlcbNode<_, _, 1, 32, 4, 4, 4, 2, 4, 8> = OpenlcbNode::new(device, services);
    node.add_node(NodeId::from_u64(0x02_01_00_00_00_01)).unwrap();

    loop {
        node.poll();
    }
}
