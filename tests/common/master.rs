//! A scripted master agent on the far end of an in-memory stream.

use async_agentx::codec::{Flags, Header};
use async_agentx::error::ResponseError;
use async_agentx::pdu::{CloseReason, ClosePdu, OpenPdu, Pdu, PduBody, PduType, ResponsePdu};
use async_agentx::transport::{DEFAULT_MAX_FRAME_SIZE, FrameReader};
use async_agentx::{Session, SessionBuilder};
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};

use super::SESSION_ID;

/// The master side of one session.
///
/// Every `expect`/`request` helper answers the subagent's keepalive pings
/// while it waits, so tests only see the PDUs they care about.
pub struct FakeMaster {
    frames: FrameReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    pub session_id: u32,
    next_packet_id: u32,
    pub pings_answered: usize,
}

impl FakeMaster {
    /// A master and the subagent end of its stream.
    pub fn new() -> (Self, DuplexStream) {
        let (agent, master) = tokio::io::duplex(64 * 1024);
        let (read, writer) = tokio::io::split(master);
        let master = Self {
            frames: FrameReader::new(read, DEFAULT_MAX_FRAME_SIZE),
            writer,
            session_id: SESSION_ID,
            next_packet_id: 1000,
            pings_answered: 0,
        };
        (master, agent)
    }

    /// Open a session through `builder`, accepting the Open.
    pub async fn connect(builder: SessionBuilder) -> (Session, Self) {
        let (mut master, stream) = Self::new();
        let (session, _) = tokio::join!(builder.open_stream(stream), master.accept_open());
        (session.expect("session should open"), master)
    }

    /// Next PDU from the subagent, or `None` once it hung up.
    pub async fn recv(&mut self) -> Option<Pdu> {
        let frame = self.frames.read_frame().await.expect("readable frame")?;
        Some(Pdu::decode(frame).expect("well-formed PDU"))
    }

    /// Next non-Ping PDU, answering pings along the way.
    pub async fn next(&mut self) -> Option<Pdu> {
        loop {
            let pdu = self.recv().await?;
            if pdu.pdu_type() == PduType::Ping {
                self.respond(&pdu, ResponsePdu::ok(Vec::new())).await;
                self.pings_answered += 1;
                continue;
            }
            return Some(pdu);
        }
    }

    /// Next non-Ping PDU, which must be of type `pdu_type`.
    pub async fn expect(&mut self, pdu_type: PduType) -> Pdu {
        let pdu = self.next().await.expect("subagent hung up");
        assert_eq!(pdu.pdu_type(), pdu_type, "unexpected PDU {:?}", pdu);
        pdu
    }

    /// Wait for the Open and accept it with [`SESSION_ID`].
    pub async fn accept_open(&mut self) -> OpenPdu {
        let pdu = self.expect(PduType::Open).await;
        let mut response = pdu.header;
        response.session_id = self.session_id;
        self.send_with(response, PduBody::Response(ResponsePdu::ok(Vec::new())))
            .await;
        match pdu.body {
            PduBody::Open(open) => open,
            _ => unreachable!(),
        }
    }

    /// Wait for the Open and refuse it.
    pub async fn refuse_open(&mut self, error: ResponseError) {
        let pdu = self.expect(PduType::Open).await;
        self.respond(&pdu, ResponsePdu::error(error, 0)).await;
    }

    /// Answer the next PDU, which must be of type `pdu_type`, with `error`.
    pub async fn answer(&mut self, pdu_type: PduType, error: ResponseError) -> Pdu {
        let pdu = self.expect(pdu_type).await;
        self.respond(&pdu, ResponsePdu::error(error, 0)).await;
        pdu
    }

    /// Accept one Register.
    pub async fn accept_register(&mut self) -> Pdu {
        self.answer(PduType::Register, ResponseError::NoError).await
    }

    /// Answer `request`, echoing its ids.
    pub async fn respond(&mut self, request: &Pdu, body: ResponsePdu) {
        self.send_with(request.header, PduBody::Response(body)).await;
    }

    /// Send a request to the subagent and wait for its Response.
    pub async fn request(&mut self, transaction_id: u32, body: PduBody) -> ResponsePdu {
        let packet_id = self.send(transaction_id, body).await;
        loop {
            let pdu = self.next().await.expect("subagent hung up");
            match pdu.body {
                PduBody::Response(resp) if pdu.header.packet_id == packet_id => {
                    assert_eq!(pdu.header.session_id, self.session_id);
                    assert_eq!(pdu.header.transaction_id, transaction_id);
                    return resp;
                }
                other => panic!("expected a Response to packet {}, got {:?}", packet_id, other),
            }
        }
    }

    /// Send a request without waiting, returning its packet id.
    pub async fn send(&mut self, transaction_id: u32, body: PduBody) -> u32 {
        let packet_id = self.next_packet_id;
        self.next_packet_id += 1;
        let mut header = Header::new(body.pdu_type());
        header.session_id = self.session_id;
        header.transaction_id = transaction_id;
        header.packet_id = packet_id;
        self.send_with(header, body).await;
        packet_id
    }

    /// Close the session from the master side.
    pub async fn close(&mut self, reason: CloseReason) {
        self.send(0, PduBody::Close(ClosePdu { reason })).await;
    }

    /// Write raw bytes, bypassing the codec.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write to subagent");
        self.writer.flush().await.expect("flush to subagent");
    }

    async fn send_with(&mut self, mut header: Header, body: PduBody) {
        header.flags = Flags::NETWORK_BYTE_ORDER;
        let pdu = Pdu {
            header,
            context: None,
            body,
        };
        let frame = pdu.encode().expect("encodable PDU");
        self.send_raw(&frame).await;
    }
}
